//! Processing strategy module for command files
//!
//! This module defines the Strategy pattern for complete processing
//! pipelines, encompassing both CSV parsing and command execution. This
//! allows different processing implementations (sequential, concurrent
//! batch) to be selected at runtime.

use crate::cli::StrategyType;
use crate::core::{EngineConfig, LedgerEngine};
use crate::io::{write_accounts_csv, write_ledger_csv};
use crate::types::{Command, LedgerError};
use anyhow::Result;
use std::io::Write;
use std::path::Path;
use tracing::warn;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete command-file pipelines
///
/// Each strategy reads commands from a CSV file, applies them to a fresh
/// engine, and writes the final account states (and optionally the ledger).
pub trait ProcessingStrategy: Send + Sync {
    /// Process commands from `input_path`
    ///
    /// Accounts are written to `output`; when `ledger_output` is given, every
    /// committed ledger record is written to it as well.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened
    /// - The engine cannot be built from its configuration
    /// - Output cannot be written
    ///
    /// Malformed rows and failed commands are logged and skipped; they do
    /// not cause an error.
    fn process(
        &self,
        input_path: &Path,
        output: &mut dyn Write,
        ledger_output: Option<&mut dyn Write>,
    ) -> Result<()>;
}

/// Create a processing strategy based on the specified strategy type
///
/// `batch` is only used by the async strategy; `None` means defaults.
pub fn create_strategy(
    strategy_type: StrategyType,
    engine: EngineConfig,
    batch: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine)),
        StrategyType::Async => {
            let batch = batch.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(engine, batch))
        }
    }
}

/// Log a command that the engine refused
fn report_failure(command: &Command, error: &LedgerError) {
    warn!(
        kind = command.kind(),
        account = command.primary_account(),
        category = ?error.category(),
        %error,
        "command failed"
    );
}

/// Write the final state of an engine
fn write_outputs(
    engine: &LedgerEngine,
    output: &mut dyn Write,
    ledger_output: Option<&mut dyn Write>,
) -> Result<()> {
    write_accounts_csv(&engine.get_accounts(), output)?;
    if let Some(ledger_output) = ledger_output {
        write_ledger_csv(engine.ledger().list_all(), ledger_output)?;
    }
    Ok(())
}
