//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. Commands are applied one at a time in file
//! order.
//!
//! # Design
//!
//! The SyncProcessingStrategy focuses on orchestration, delegating:
//! - CSV parsing to `SyncReader` (iterator interface)
//! - Command execution to `LedgerEngine`
//! - CSV output to the `csv_format` writers

use super::{report_failure, write_outputs, ProcessingStrategy};
use crate::core::{EngineConfig, LedgerEngine};
use crate::io::sync_reader::SyncReader;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Sequential processing strategy
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncProcessingStrategy {
    config: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
        ledger_output: Option<&mut dyn Write>,
    ) -> Result<()> {
        let engine = LedgerEngine::new(self.config).context("failed to build engine")?;

        let reader = SyncReader::new(input_path)?;

        for result in reader {
            match result {
                Ok(command) => {
                    if let Err(e) = engine.apply(&command) {
                        report_failure(&command, &e);
                    }
                }
                Err(e) => warn!(error = %format!("{:#}", e), "skipping row"),
            }
        }

        write_outputs(&engine, output, ledger_output)
    }
}
