//! Append-only transaction ledger
//!
//! This module provides the `Ledger` struct, which stores committed transfer
//! records in commit order.
//!
//! # Design
//!
//! Records are appended in groups through [`Ledger::commit`], which also runs
//! the caller's publish step while the ledger's write lock is held. The
//! capacity check happens first, so a refused group publishes nothing; an
//! accepted group becomes visible together with the balances it describes.
//! Holding the write lock across both steps also makes sequence order equal
//! commit order.
//!
//! # Reads
//!
//! [`Ledger::list_all`] and [`Ledger::list_by_account`] return a
//! [`LedgerView`]: a snapshot bounded by the record count at the time of the
//! call. Iterating a view is lazy (one short read lock per record) and can be
//! restarted any number of times with the same result.

use crate::types::{AccountId, LedgerError, LedgerRecord, PendingRecord, Sequence};
use chrono::Utc;
use parking_lot::RwLock;

/// Append-only, thread-safe ledger of committed transfers
#[derive(Debug)]
pub struct Ledger {
    /// Committed records; index `i` holds sequence `i + 1`
    records: RwLock<Vec<LedgerRecord>>,

    /// Upper bound on stored records, `None` for unbounded
    capacity: Option<usize>,
}

impl Ledger {
    /// Create an unbounded ledger
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            capacity: None,
        }
    }

    /// Create a ledger that refuses writes beyond `capacity` records
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(Vec::with_capacity(capacity)),
            capacity: Some(capacity),
        }
    }

    /// Write a group of records and run `publish` as one step
    ///
    /// Either every record is written and `publish` has run, or the call
    /// fails, nothing is written and `publish` is dropped without running.
    /// All records of the group share one timestamp.
    ///
    /// # Errors
    ///
    /// Returns `LedgerWriteFailed` if the group would exceed the capacity.
    ///
    /// Only units of work write records, so every record has a matching
    /// balance change.
    pub(crate) fn commit<F>(&self, pending: Vec<PendingRecord>, publish: F) -> Result<Vec<LedgerRecord>, LedgerError>
    where
        F: FnOnce(),
    {
        let mut records = self.records.write();

        if let Some(capacity) = self.capacity {
            if records.len() + pending.len() > capacity {
                return Err(LedgerError::ledger_write_failed(format!(
                    "capacity of {} records exceeded",
                    capacity
                )));
            }
        }

        publish();

        let timestamp = Utc::now();
        let first = records.len() as Sequence + 1;
        let committed: Vec<LedgerRecord> = pending
            .into_iter()
            .enumerate()
            .map(|(offset, record)| LedgerRecord {
                sequence: first + offset as Sequence,
                source: record.source,
                destination: record.destination,
                amount: record.amount,
                timestamp,
                batch: record.batch,
            })
            .collect();

        records.extend_from_slice(&committed);
        Ok(committed)
    }

    /// Number of committed records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether no record has been committed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every record committed so far, in sequence order
    pub fn list_all(&self) -> LedgerView<'_> {
        LedgerView {
            ledger: self,
            upto: self.len(),
            account: None,
        }
    }

    /// Records committed so far in which `account` is source or destination
    pub fn list_by_account(&self, account: AccountId) -> LedgerView<'_> {
        LedgerView {
            ledger: self,
            upto: self.len(),
            account: Some(account),
        }
    }

    fn record_at(&self, index: usize) -> Option<LedgerRecord> {
        self.records.read().get(index).copied()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

/// Restartable snapshot over ledger records
///
/// Records committed after the view was created are not part of it.
#[derive(Debug, Clone, Copy)]
pub struct LedgerView<'a> {
    ledger: &'a Ledger,
    upto: usize,
    account: Option<AccountId>,
}

impl<'a> LedgerView<'a> {
    /// Start a fresh pass over the view
    pub fn iter(&self) -> LedgerIter<'a> {
        LedgerIter {
            view: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for LedgerView<'a> {
    type Item = LedgerRecord;
    type IntoIter = LedgerIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for &LedgerView<'a> {
    type Item = LedgerRecord;
    type IntoIter = LedgerIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over a [`LedgerView`]
#[derive(Debug, Clone)]
pub struct LedgerIter<'a> {
    view: LedgerView<'a>,
    next: usize,
}

impl Iterator for LedgerIter<'_> {
    type Item = LedgerRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.view.upto {
            let record = self.view.ledger.record_at(self.next)?;
            self.next += 1;
            match self.view.account {
                Some(account) if !record.involves(account) => continue,
                _ => return Some(record),
            }
        }
        None
    }
}
