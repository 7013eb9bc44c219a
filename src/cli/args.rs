use crate::core::{EngineConfig, ExecutorConfig, GateConfig, HashParams};
use crate::logging::LogFormat;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Minimum Argon2 memory cost in KiB for a single lane
const MIN_HASH_MEMORY_KIB: u32 = 8;

/// Apply account commands and transfers from a CSV command file
#[derive(Parser, Debug)]
#[command(name = "transfer-ledger")]
#[command(about = "Apply account commands and transfers from a CSV command file", long_about = None)]
pub struct CliArgs {
    /// Input CSV file path containing commands
    #[arg(value_name = "INPUT", help = "Path to the input CSV file")]
    pub input_file: PathBuf,

    /// Processing strategy
    ///
    /// `async` runs commands of different source accounts concurrently, so a
    /// transfer that spends funds credited earlier in the same chunk by
    /// another account may fail where `sync` would apply it.
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent (async may order dependent transfers across accounts differently)"
    )]
    pub strategy: StrategyType,

    /// Number of commands per chunk (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of commands per chunk (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of concurrent workers (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of workers applying commands concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Bounded wait for account locks
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        help = "Maximum time to wait for account locks (default: 2000)"
    )]
    pub lock_timeout_ms: Option<u64>,

    /// Failed authorization attempts tolerated per account
    #[arg(
        long = "max-failed-attempts",
        value_name = "COUNT",
        help = "Failed attempts per account before refusing further attempts, 0 disables (default: 5)"
    )]
    pub max_failed_attempts: Option<u32>,

    /// Window for counting failed authorization attempts
    #[arg(
        long = "attempt-window-secs",
        value_name = "SECONDS",
        help = "Window for counting failed attempts (default: 60)"
    )]
    pub attempt_window_secs: Option<u64>,

    /// Argon2 memory cost for new credential hashes
    #[arg(long = "hash-memory-kib", value_name = "KIB", help = "Argon2 memory cost in KiB")]
    pub hash_memory_kib: Option<u32>,

    /// Argon2 passes for new credential hashes
    #[arg(long = "hash-iterations", value_name = "COUNT", help = "Argon2 passes")]
    pub hash_iterations: Option<u32>,

    /// Optional ledger output file
    #[arg(
        long = "ledger",
        value_name = "PATH",
        help = "Write every committed ledger record to this CSV file"
    )]
    pub ledger: Option<PathBuf>,

    /// Log output format
    #[arg(
        long = "log-format",
        value_name = "FORMAT",
        default_value = "text",
        help = "Log format on stderr: 'text' or 'json'"
    )]
    pub log_format: LogFormat,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to defaults; invalid values are replaced by
    /// defaults with a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Create an EngineConfig from CLI arguments
    ///
    /// Missing values fall back to defaults; invalid values are replaced by
    /// defaults with a warning.
    pub fn to_engine_config(&self) -> EngineConfig {
        let executor_default = ExecutorConfig::default();
        let gate_default = GateConfig::default();
        let hash_default = HashParams::default();

        let lock_timeout = match self.lock_timeout_ms {
            Some(0) => {
                warn!(
                    default_ms = executor_default.lock_timeout.as_millis() as u64,
                    "invalid lock timeout (0), using default"
                );
                executor_default.lock_timeout
            }
            Some(millis) => Duration::from_millis(millis),
            None => executor_default.lock_timeout,
        };

        let window = match self.attempt_window_secs {
            Some(0) => {
                warn!(
                    default_secs = gate_default.window.as_secs(),
                    "invalid attempt window (0), using default"
                );
                gate_default.window
            }
            Some(secs) => Duration::from_secs(secs),
            None => gate_default.window,
        };

        let memory_kib = match self.hash_memory_kib {
            Some(kib) if kib < MIN_HASH_MEMORY_KIB => {
                warn!(
                    hash_memory_kib = kib,
                    default = hash_default.memory_kib,
                    "hash memory below minimum, using default"
                );
                hash_default.memory_kib
            }
            Some(kib) => kib,
            None => hash_default.memory_kib,
        };

        let iterations = match self.hash_iterations {
            Some(0) => {
                warn!(
                    default = hash_default.iterations,
                    "invalid hash iterations (0), using default"
                );
                hash_default.iterations
            }
            Some(iterations) => iterations,
            None => hash_default.iterations,
        };

        EngineConfig {
            executor: ExecutorConfig { lock_timeout },
            gate: GateConfig {
                hash: HashParams {
                    memory_kib,
                    iterations,
                    parallelism: hash_default.parallelism,
                },
                max_failed_attempts: self
                    .max_failed_attempts
                    .unwrap_or(gate_default.max_failed_attempts),
                window,
            },
        }
    }
}
