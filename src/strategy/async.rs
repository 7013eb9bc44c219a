//! Asynchronous batch processing strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. It reads commands in chunks and applies each
//! chunk concurrently with account-based partitioning.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (chunked CSV reading)
//!     ├── BatchProcessor (account partitioning + blocking pool)
//!     └── LedgerEngine (thread-safe command execution)
//!         ├── AccountStore (row-locked account state)
//!         ├── Ledger (append-only records)
//!         └── PinGate (credential checks)
//! ```
//!
//! # Ordering
//!
//! - Chunks are processed one after another
//! - Within a chunk, `open` and `deactivate` run alone, in file order
//! - Commands sharing a primary account run in file order
//! - Other commands may commit in any order; account locks keep each one
//!   atomic

use super::{report_failure, write_outputs, ProcessingStrategy};
use crate::core::{BatchProcessor, EngineConfig, LedgerEngine};
use crate::io::async_reader::AsyncReader;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a config, replacing zero values with defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Concurrent chunked processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    engine: EngineConfig,
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(engine: EngineConfig, config: BatchConfig) -> Self {
        Self { engine, config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    fn process(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
        ledger_output: Option<&mut dyn Write>,
    ) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()
            .context("failed to create tokio runtime")?;

        let engine = Arc::new(LedgerEngine::new(self.engine).context("failed to build engine")?);
        let processor = BatchProcessor::new(Arc::clone(&engine));

        runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .with_context(|| format!("failed to open file '{}'", input_path.display()))?;

            // csv-async reads through the futures traits
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);

            let mut reader = AsyncReader::new(compat_file);

            // Chunks run one after another so that file order holds across chunk boundaries
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;

                if batch.is_empty() {
                    break;
                }

                for outcome in processor.process_batch(batch).await {
                    if let Err(e) = &outcome.result {
                        report_failure(&outcome.command, e);
                    }
                }
            }

            Ok::<(), anyhow::Error>(())
        })?;

        write_outputs(&engine, output, ledger_output)
    }
}
