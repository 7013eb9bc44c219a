//! Transfer-related types for the transfer ledger
//!
//! This module defines transfer requests, ledger records and the executor's
//! per-attempt state machine.

use super::account::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use uuid::Uuid;

/// Ledger sequence number
///
/// Assigned at commit, starting at 1, strictly increasing in commit order.
pub type Sequence = u64;

/// Maximum number of decimal places accepted in a transfer amount
pub const AMOUNT_SCALE: u32 = 4;

/// One destination of a batch transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferLeg {
    /// Account credited by this leg
    pub to: AccountId,

    /// Amount credited, positive
    pub amount: Decimal,
}

impl TransferLeg {
    /// Create a leg crediting `amount` to `to`
    pub fn new(to: AccountId, amount: Decimal) -> Self {
        TransferLeg { to, amount }
    }
}

/// A ledger entry staged inside a unit of work
///
/// Becomes a [`LedgerRecord`] when the unit commits; the sequence number and
/// timestamp are assigned at that moment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingRecord {
    /// Debited account, `None` for deposits
    pub source: Option<AccountId>,

    /// Credited account
    pub destination: AccountId,

    /// Amount moved, positive
    pub amount: Decimal,

    /// Batch this record belongs to, if any
    pub batch: Option<Uuid>,
}

/// Immutable record of a committed transfer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerRecord {
    /// Commit sequence number
    pub sequence: Sequence,

    /// Debited account, `None` for deposits
    pub source: Option<AccountId>,

    /// Credited account
    pub destination: AccountId,

    /// Amount moved, positive
    pub amount: Decimal,

    /// Commit time
    pub timestamp: DateTime<Utc>,

    /// Batch this record belongs to, if any
    pub batch: Option<Uuid>,
}

impl LedgerRecord {
    /// Whether `account` is the source or the destination of this record
    pub fn involves(&self, account: AccountId) -> bool {
        self.source == Some(account) || self.destination == account
    }
}

/// Result of a committed batch transfer
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReceipt {
    /// Identifier shared by every record of the batch
    pub batch_id: Uuid,

    /// Total debited from the source
    pub total: Decimal,

    /// One record per leg, in leg order
    pub records: Vec<LedgerRecord>,
}

/// States of a single transfer attempt
///
/// An attempt moves forward through these states and ends in exactly one of
/// `Committed` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Received,
    Authorizing,
    Locking,
    Validating,
    Mutating,
    Committing,
    Committed,
    Aborted,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Received => "RECEIVED",
            TransferState::Authorizing => "AUTHORIZING",
            TransferState::Locking => "LOCKING",
            TransferState::Validating => "VALIDATING",
            TransferState::Mutating => "MUTATING",
            TransferState::Committing => "COMMITTING",
            TransferState::Committed => "COMMITTED",
            TransferState::Aborted => "ABORTED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_involves_source_and_destination() {
        let record = LedgerRecord {
            sequence: 1,
            source: Some(1),
            destination: 2,
            amount: Decimal::ONE,
            timestamp: Utc::now(),
            batch: None,
        };

        assert!(record.involves(1));
        assert!(record.involves(2));
        assert!(!record.involves(3));
    }

    #[test]
    fn test_deposit_record_involves_only_destination() {
        let record = LedgerRecord {
            sequence: 1,
            source: None,
            destination: 5,
            amount: Decimal::ONE,
            timestamp: Utc::now(),
            batch: None,
        };

        assert!(record.involves(5));
        assert!(!record.involves(0));
    }
}
