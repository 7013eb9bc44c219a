//! Asynchronous CSV reader with chunked reading interface
//!
//! Reads commands from any `futures::io::AsyncRead` source in chunks. Rows
//! that fail to parse are logged and skipped; tagged transfer rows are
//! merged into batch commands the same way as in the sync reader, including
//! batches that span a chunk boundary.

use crate::io::csv_format::{convert_csv_record, BatchAssembler, CsvRecord};
use crate::types::Command;
use anyhow::Context;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous command-file reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    assembler: BatchAssembler,
    line_num: usize,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a reader over `reader`, which must start with the header row
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            assembler: BatchAssembler::new(),
            line_num: 1,
            exhausted: false,
        }
    }

    /// Read up to about `batch_size` commands
    ///
    /// A chunk may exceed `batch_size` by one when a completed batch and the
    /// row that closed it arrive together. An empty result means end of
    /// input.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<Command> {
        let mut batch = Vec::with_capacity(batch_size);
        if self.exhausted {
            return batch;
        }

        let mut records = self.csv_reader.deserialize::<CsvRecord>();

        while batch.len() < batch_size {
            let Some(parsed) = records.next().await else {
                self.exhausted = true;
                batch.extend(self.assembler.finish());
                break;
            };
            self.line_num += 1;

            let pushed = parsed
                .context("CSV parse error")
                .and_then(convert_csv_record)
                .and_then(|row| self.assembler.push(row));
            match pushed {
                Ok(commands) => batch.extend(commands),
                Err(e) => warn!(line = self.line_num, error = %format!("{:#}", e), "skipping row"),
            }
        }

        batch
    }
}
