//! Account-related types for the transfer ledger
//!
//! This module defines the Account structure and its lifecycle status.

use super::credential::SecretHash;
use super::error::LedgerError;
use rust_decimal::Decimal;
use std::fmt;

/// Account identifier
///
/// Opaque to the engine apart from its total order, which the lock
/// coordinator uses to rank accounts.
pub type AccountId = u64;

/// Lifecycle status of an account
///
/// Accounts are never deleted. Deactivation is the terminal state and
/// blocks every further balance mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    /// Balance may be debited and credited
    Active,
    /// No balance mutation is permitted
    Inactive,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Inactive => f.write_str("inactive"),
        }
    }
}

/// Account state
///
/// Represents one row of the account arena: identity, balance, status and
/// the credential hash consumed by the authorization gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// The account ID
    pub id: AccountId,

    /// Current balance in the ledger's single currency
    ///
    /// Never negative at any point another transaction can observe.
    pub balance: Decimal,

    /// Whether the account accepts balance mutations
    pub status: AccountStatus,

    /// Credential hash, read only by the authorization gate
    pub secret_hash: SecretHash,
}

impl Account {
    /// Create a new account with zero balance and active status
    ///
    /// # Arguments
    ///
    /// * `id` - The account ID
    /// * `secret_hash` - Hash of the credential that authorizes debits
    pub fn new(id: AccountId, secret_hash: SecretHash) -> Self {
        Account {
            id,
            balance: Decimal::ZERO,
            status: AccountStatus::Active,
            secret_hash,
        }
    }

    /// Whether the account accepts balance mutations
    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Fail with `AccountInactive` unless the account is active
    pub fn ensure_active(&self) -> Result<(), LedgerError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(LedgerError::account_inactive(self.id))
        }
    }

    /// Fail with `InsufficientFunds` unless the balance covers `amount`
    pub fn ensure_covers(&self, amount: Decimal) -> Result<(), LedgerError> {
        if self.balance < amount {
            return Err(LedgerError::insufficient_funds(self.id, self.balance, amount));
        }
        Ok(())
    }
}
