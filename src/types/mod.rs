//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account identity, balance and status
//! - `command`: Operations requested by command files
//! - `credential`: Opaque credential material and authorization outcomes
//! - `transaction`: Transfer requests, ledger records and transfer states
//! - `error`: Error types for the transfer ledger

pub mod account;
pub mod command;
pub mod credential;
pub mod error;
pub mod transaction;

pub use account::{Account, AccountId, AccountStatus};
pub use command::Command;
pub use credential::{Authorization, Credential, SecretHash};
pub use error::{ErrorCategory, LedgerError};
pub use transaction::{
    BatchReceipt, LedgerRecord, PendingRecord, Sequence, TransferLeg, TransferState, AMOUNT_SCALE,
};
