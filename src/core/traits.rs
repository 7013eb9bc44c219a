//! Core traits for storage, commit boundaries and authorization
//!
//! The transfer executor is written against these seams only. A backend
//! (in-memory, relational, log-structured) provides locked units of work with
//! all-or-nothing commit; an authorization gate answers whether a credential
//! may act on an account.

use crate::types::{Account, AccountId, Authorization, Credential, LedgerError, LedgerRecord, PendingRecord};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Trait for verifying credentials before a mutation
///
/// The executor never retries a call and never holds an account lock while
/// one is in flight.
pub trait AuthorizationGate: Send + Sync {
    /// Check `credential` against the stored secret of `account`
    fn authorize(&self, account: AccountId, credential: &Credential) -> Authorization;
}

impl<G: AuthorizationGate + ?Sized> AuthorizationGate for Arc<G> {
    fn authorize(&self, account: AccountId, credential: &Credential) -> Authorization {
        (**self).authorize(account, credential)
    }
}

/// A locked set of accounts plus staged ledger records
///
/// Changes made through a unit are invisible to everyone else until
/// [`UnitOfWork::commit`] returns `Ok`. Dropping a unit without committing
/// discards every staged change and releases its locks.
pub trait UnitOfWork {
    /// Current state of a locked account, including changes staged so far
    fn account(&self, id: AccountId) -> Result<&Account, LedgerError>;

    /// Adjust a locked account's balance by a signed amount
    ///
    /// Fails with `AccountInactive` if the account is not active and with
    /// `InsufficientFunds` if the balance would go negative.
    fn apply_delta(&mut self, id: AccountId, delta: Decimal) -> Result<(), LedgerError>;

    /// Stage one record to be written when the unit commits
    fn append(&mut self, record: PendingRecord);

    /// Publish staged balances and records as one unit, then release locks
    ///
    /// On error nothing is published.
    fn commit(self) -> Result<Vec<LedgerRecord>, LedgerError>;

    /// Discard staged changes and release locks
    fn abort(self);
}

/// Trait for a storage backend offering atomic units of work
pub trait StorageBackend: Send + Sync {
    /// Unit of work type produced by [`StorageBackend::begin_unit`]
    type Unit: UnitOfWork;

    /// Non-locking read of an account, possibly stale
    fn get(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Lock every account in `ids` and open a unit of work over them
    ///
    /// Locks are taken in the fixed total order regardless of the order of
    /// `ids`; duplicates are ignored. Fails with `AccountNotFound` before
    /// taking any lock, or with `LockTimeout` if the whole set cannot be
    /// acquired within `timeout`.
    fn begin_unit(&self, ids: &[AccountId], timeout: Duration) -> Result<Self::Unit, LedgerError>;
}
