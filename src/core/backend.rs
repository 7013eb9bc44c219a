//! In-memory storage backend
//!
//! Pairs an [`AccountStore`] with a [`Ledger`] and implements the commit
//! boundary over them.
//!
//! # Architecture
//!
//! ```text
//! InMemoryBackend
//!     ├── Arc<AccountStore>  (account arena + row locks)
//!     └── Arc<Ledger>        (append-only records)
//!
//! InMemoryUnit
//!     ├── LockSet            (held row locks + working copies)
//!     ├── Arc<Ledger>
//!     └── Vec<PendingRecord> (staged records)
//! ```
//!
//! Committing hands the staged records to [`Ledger::commit`] with the lock
//! set's publish step, so balances and records appear together or not at all.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use super::account_store::{AccountStore, LockSet};
use super::ledger::Ledger;
use super::traits::{StorageBackend, UnitOfWork};
use crate::types::{Account, AccountId, LedgerError, LedgerRecord, PendingRecord};

/// Storage backend keeping accounts and ledger in process memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    accounts: Arc<AccountStore>,
    ledger: Arc<Ledger>,
}

impl InMemoryBackend {
    /// Create a backend with an empty store and an unbounded ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend over existing components
    pub fn with_parts(accounts: Arc<AccountStore>, ledger: Arc<Ledger>) -> Self {
        Self { accounts, ledger }
    }

    /// The account store
    pub fn accounts(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    /// The ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }
}

impl StorageBackend for InMemoryBackend {
    type Unit = InMemoryUnit;

    fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts.get(id)
    }

    fn begin_unit(&self, ids: &[AccountId], timeout: Duration) -> Result<Self::Unit, LedgerError> {
        let locks = self.accounts.lock_for_update(ids, timeout)?;
        Ok(InMemoryUnit {
            locks,
            ledger: Arc::clone(&self.ledger),
            pending: Vec::new(),
        })
    }
}

/// Unit of work over locked in-memory accounts
#[derive(Debug)]
pub struct InMemoryUnit {
    locks: LockSet,
    ledger: Arc<Ledger>,
    pending: Vec<PendingRecord>,
}

impl UnitOfWork for InMemoryUnit {
    fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.locks.account(id)
    }

    fn apply_delta(&mut self, id: AccountId, delta: Decimal) -> Result<(), LedgerError> {
        self.locks.apply_delta(id, delta)
    }

    fn append(&mut self, record: PendingRecord) {
        self.pending.push(record);
    }

    fn commit(self) -> Result<Vec<LedgerRecord>, LedgerError> {
        let InMemoryUnit {
            locks,
            ledger,
            pending,
        } = self;
        ledger.commit(pending, move || locks.publish())
    }

    fn abort(self) {
        drop(self);
    }
}
