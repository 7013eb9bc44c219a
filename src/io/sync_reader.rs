//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over commands from a command file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Design
//!
//! The SyncReader uses csv::Reader to read and deserialize rows sequentially
//! and a [`BatchAssembler`] to merge tagged transfer rows into batch
//! commands. Only the rows of the batch currently being assembled are held in
//! memory.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `anyhow::Result<Command>` for each command:
//!
//! ```no_run
//! use transfer_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Processing {}", command.kind()),
//!         Err(e) => eprintln!("Error: {:#}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use crate::io::csv_format::{convert_csv_record, BatchAssembler, CsvRecord};
use crate::types::Command;
use anyhow::{Context, Result};
use csv::{DeserializeRecordsIntoIter, ReaderBuilder, Trim};
use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;

/// Synchronous command-file reader
pub struct SyncReader {
    records: DeserializeRecordsIntoIter<File, CsvRecord>,
    assembler: BatchAssembler,
    ready: VecDeque<Command>,
    line_num: usize,
    finished: bool,
}

impl SyncReader {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns)
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Errors
    ///
    /// Returns an error if the file could not be opened.
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open file '{}'", path.display()))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            records: reader.into_deserialize(),
            assembler: BatchAssembler::new(),
            ready: VecDeque::new(),
            line_num: 1,
            finished: false,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(command) = self.ready.pop_front() {
                return Some(Ok(command));
            }
            if self.finished {
                return None;
            }

            let Some(parsed) = self.records.next() else {
                self.finished = true;
                return self.assembler.finish().map(Ok);
            };
            self.line_num += 1;
            let line = self.line_num;

            let pushed = parsed
                .context("CSV parse error")
                .and_then(convert_csv_record)
                .and_then(|row| self.assembler.push(row));
            match pushed {
                Ok(commands) => self.ready.extend(commands),
                Err(e) => return Some(Err(e.context(format!("line {}", line)))),
            }
        }
    }
}
