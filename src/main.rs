//! Transfer Ledger CLI
//!
//! Command-line interface for applying account commands and transfers from
//! CSV command files.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- commands.csv > accounts.csv
//! cargo run -- --strategy sync commands.csv > accounts.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 commands.csv > accounts.csv
//! cargo run -- --ledger ledger.csv --lock-timeout-ms 500 commands.csv > accounts.csv
//! RUST_LOG=debug cargo run -- --log-format json commands.csv > accounts.csv
//! ```
//!
//! The program reads commands from the input CSV file, applies them with the
//! selected processing strategy, and writes the final account states to
//! stdout. Logs go to stderr.
//!
//! # Processing Strategies
//!
//! - **sync**: Commands applied one at a time in file order
//! - **async**: Chunks applied concurrently, partitioned by account (default)
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not writable, etc.)

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::process;
use transfer_ledger::{cli, logging, strategy};

fn main() {
    let args = cli::parse_args();

    logging::init(args.log_format);

    if let Err(e) = run(&args) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(args: &cli::CliArgs) -> Result<()> {
    let strategy = {
        let batch = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), args.to_engine_config(), batch)
    };

    let mut ledger_file = match &args.ledger {
        Some(path) => Some(BufWriter::new(
            File::create(path)
                .with_context(|| format!("failed to create ledger file '{}'", path.display()))?,
        )),
        None => None,
    };

    let mut output = std::io::stdout().lock();
    strategy.process(
        &args.input_file,
        &mut output,
        ledger_file.as_mut().map(|file| file as &mut dyn Write),
    )?;

    if let Some(file) = ledger_file.as_mut() {
        file.flush().context("failed to flush ledger file")?;
    }
    Ok(())
}
