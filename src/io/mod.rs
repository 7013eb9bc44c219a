//! I/O module
//!
//! Handles command-file parsing and CSV output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (row conversion, batch grouping, output serialization)
//! - `sync_reader` - Synchronous command reader with iterator interface
//! - `async_reader` - Asynchronous command reader with chunked reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use csv_format::{
    convert_csv_record, write_accounts_csv, write_ledger_csv, BatchAssembler, CsvRecord, Row,
};
pub use sync_reader::SyncReader;
