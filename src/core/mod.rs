//! Core business logic module
//!
//! This module contains the transfer processing components:
//! - `traits` - Seams for storage backends, units of work and authorization
//! - `lock_order` - The fixed total order in which account locks are taken
//! - `account_store` - Account state, row locks and lifecycle
//! - `ledger` - Append-only record of committed transfers
//! - `backend` - In-memory commit boundary over store and ledger
//! - `authorization` - PIN verification with failed-attempt limiting
//! - `executor` - Transfer state machine
//! - `engine` - Command dispatch over all of the above
//! - `batch_processor` - Concurrent command dispatch

pub mod account_store;
pub mod authorization;
pub mod backend;
pub mod batch_processor;
pub mod engine;
pub mod executor;
pub mod ledger;
pub mod lock_order;
pub mod traits;

pub use account_store::{AccountStore, LockSet};
pub use authorization::{GateConfig, HashParams, PinGate};
pub use backend::{InMemoryBackend, InMemoryUnit};
pub use batch_processor::{BatchProcessor, ProcessingResult};
pub use engine::{EngineConfig, LedgerEngine};
pub use executor::{ExecutorConfig, TransferExecutor};
pub use ledger::{Ledger, LedgerView};
pub use lock_order::lock_order;
pub use traits::{AuthorizationGate, StorageBackend, UnitOfWork};
