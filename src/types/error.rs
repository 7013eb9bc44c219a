//! Error types for the transfer ledger
//!
//! Every failure of a transfer, batch or deposit is a clean abort: no balance
//! change and no ledger record survives it. Errors are grouped into four
//! categories that tell callers how the abort came about.
//!
//! # Error Categories
//!
//! - **Input**: invalid amount, empty batch, same-account transfer, unknown
//!   or duplicate account, malformed credential. Rejected before any lock.
//! - **Authorization**: denied or rate-limited credential. Rejected before any
//!   lock, reported without saying which check failed.
//! - **State**: insufficient funds, inactive account, balance overflow.
//!   Detected under lock.
//! - **Infrastructure**: lock timeout, ledger write failure, hashing failure.
//!   Never retried inside the engine.

use crate::types::AccountId;
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`LedgerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Authorization,
    State,
    Infrastructure,
}

/// Main error type for the transfer ledger
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    /// Amount is zero, negative, or more precise than 4 decimal places
    #[error("Invalid amount {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: Decimal,
    },

    /// Batch transfer without any leg
    #[error("Batch transfer from account {account} has no legs")]
    EmptyBatch {
        /// Source account of the batch
        account: AccountId,
    },

    /// Source and destination are the same account
    #[error("Cannot transfer from account {account} to itself")]
    SameAccount {
        /// The account named on both sides
        account: AccountId,
    },

    /// No account exists with this ID
    #[error("Account {account} not found")]
    AccountNotFound {
        /// The unknown account ID
        account: AccountId,
    },

    /// Provisioning an ID that is already taken
    #[error("Account {account} already exists")]
    AccountExists {
        /// The duplicate account ID
        account: AccountId,
    },

    /// Account is deactivated and cannot be debited or credited
    #[error("Account {account} is inactive")]
    AccountInactive {
        /// The inactive account ID
        account: AccountId,
    },

    /// Credential was not accepted for this account
    #[error("Unauthorized for account {account}")]
    Unauthorized {
        /// The account the credential was presented for
        account: AccountId,
    },

    /// Balance does not cover the requested debit
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// The debited account
        account: AccountId,
        /// Balance at the time of the check
        available: Decimal,
        /// Amount that would have been debited
        requested: Decimal,
    },

    /// A credit would overflow the balance representation
    #[error("Arithmetic overflow crediting account {account}")]
    ArithmeticOverflow {
        /// The credited account
        account: AccountId,
    },

    /// Account locks could not be acquired within the bounded wait
    #[error("Timed out after {waited_ms}ms waiting for account locks")]
    LockTimeout {
        /// The configured wait, in milliseconds
        waited_ms: u64,
    },

    /// The ledger refused the records of a unit of work
    #[error("Ledger write failed: {reason}")]
    LedgerWriteFailed {
        /// Description of the failure
        reason: String,
    },

    /// Credential does not have the required shape
    #[error("Credential must be exactly 4 digits")]
    MalformedCredential,

    /// Computing a credential hash failed
    #[error("Credential hashing failed: {reason}")]
    CredentialHashing {
        /// Description of the failure
        reason: String,
    },
}

impl LedgerError {
    /// Create an InvalidAmount error
    pub fn invalid_amount(amount: Decimal) -> Self {
        LedgerError::InvalidAmount { amount }
    }

    /// Create an EmptyBatch error
    pub fn empty_batch(account: AccountId) -> Self {
        LedgerError::EmptyBatch { account }
    }

    /// Create a SameAccount error
    pub fn same_account(account: AccountId) -> Self {
        LedgerError::SameAccount { account }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: AccountId) -> Self {
        LedgerError::AccountNotFound { account }
    }

    /// Create an AccountExists error
    pub fn account_exists(account: AccountId) -> Self {
        LedgerError::AccountExists { account }
    }

    /// Create an AccountInactive error
    pub fn account_inactive(account: AccountId) -> Self {
        LedgerError::AccountInactive { account }
    }

    /// Create an Unauthorized error
    pub fn unauthorized(account: AccountId) -> Self {
        LedgerError::Unauthorized { account }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: AccountId, available: Decimal, requested: Decimal) -> Self {
        LedgerError::InsufficientFunds {
            account,
            available,
            requested,
        }
    }

    /// Create an ArithmeticOverflow error
    pub fn arithmetic_overflow(account: AccountId) -> Self {
        LedgerError::ArithmeticOverflow { account }
    }

    /// Create a LockTimeout error
    pub fn lock_timeout(waited: Duration) -> Self {
        LedgerError::LockTimeout {
            waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Create a LedgerWriteFailed error
    pub fn ledger_write_failed(reason: impl Into<String>) -> Self {
        LedgerError::LedgerWriteFailed {
            reason: reason.into(),
        }
    }

    /// Create a CredentialHashing error
    pub fn credential_hashing(reason: impl Into<String>) -> Self {
        LedgerError::CredentialHashing {
            reason: reason.into(),
        }
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            LedgerError::InvalidAmount { .. }
            | LedgerError::EmptyBatch { .. }
            | LedgerError::SameAccount { .. }
            | LedgerError::AccountNotFound { .. }
            | LedgerError::AccountExists { .. }
            | LedgerError::MalformedCredential => ErrorCategory::Input,
            LedgerError::Unauthorized { .. } => ErrorCategory::Authorization,
            LedgerError::InsufficientFunds { .. }
            | LedgerError::AccountInactive { .. }
            | LedgerError::ArithmeticOverflow { .. } => ErrorCategory::State,
            LedgerError::LockTimeout { .. }
            | LedgerError::LedgerWriteFailed { .. }
            | LedgerError::CredentialHashing { .. } => ErrorCategory::Infrastructure,
        }
    }
}
