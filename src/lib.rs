//! Transfer Ledger Library
//! # Overview
//!
//! This library provides a transactional ledger core: account balances that
//! only change through all-or-nothing transfers, each of which leaves exactly
//! one immutable record per leg in an append-only ledger.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Account, LedgerRecord, LedgerError, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::account_store`] - Account state and per-account row locks
//!   - [`core::ledger`] - Append-only transfer records
//!   - [`core::authorization`] - PIN verification with failed-attempt limiting
//!   - [`core::executor`] - The transfer state machine
//!   - [`core::lock_order`] - The fixed order in which locks are taken
//! - [`io`] - Command-file parsing and CSV output
//! - [`strategy`] - Sequential and concurrent processing pipelines
//! - [`logging`] - Tracing subscriber setup
//!
//! # Operations
//!
//! - **Transfer**: Move funds from one account to another
//! - **Batch transfer**: Move funds from one account to several, atomically
//! - **Deposit**: Credit external funds to an account
//! - **Open / Deactivate**: Account lifecycle
//!
//! # Guarantees
//!
//! - No balance is ever negative
//! - Transfers conserve the sum of balances; only deposits change it
//! - Every committed leg has exactly one ledger record, and every record
//!   describes a balance change that is visible
//! - Concurrent transfers never deadlock; lock waits are bounded

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod logging;
pub mod strategy;
pub mod types;

pub use core::{AccountStore, Ledger, LedgerEngine, PinGate, TransferExecutor};
pub use io::{write_accounts_csv, write_ledger_csv};
pub use types::{
    Account, AccountId, AccountStatus, BatchReceipt, Command, Credential, LedgerError,
    LedgerRecord, TransferLeg,
};
