//! Account storage with an explicit lock table
//!
//! This module provides the `AccountStore` struct, an arena of accounts keyed
//! by id in which every account owns a row lock.
//!
//! # Design
//!
//! Each account lives in an `AccountSlot` holding two things:
//!
//! - a row lock (`Arc<Mutex<()>>`), held by a writer for the whole of a unit
//!   of work, from acquisition until commit or abort
//! - the published account state (`RwLock<Account>`), written only by the
//!   holder of the row lock at publish time
//!
//! Display reads (`get`) touch only the published state and never wait for
//! the row lock. A writer works on a private copy taken under the row lock and
//! publishes it in one step, so no reader ever sees an in-flight mutation.
//!
//! # Thread Safety
//!
//! Slots are shared through `DashMap` and cloned out as `Arc`s, so no DashMap
//! shard guard is ever held while waiting on a row lock. Multi-account
//! acquisition follows [`lock_order`].

use crate::core::lock_order::lock_order;
use crate::types::{Account, AccountId, AccountStatus, LedgerError, SecretHash};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex, RwLock};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

type RowGuard = ArcMutexGuard<RawMutex, ()>;

#[derive(Debug)]
struct AccountSlot {
    row: Arc<Mutex<()>>,
    state: RwLock<Account>,
}

impl AccountSlot {
    fn new(account: Account) -> Self {
        Self {
            row: Arc::new(Mutex::new(())),
            state: RwLock::new(account),
        }
    }
}

/// Thread-safe account arena with per-account row locks
#[derive(Debug, Default)]
pub struct AccountStore {
    /// Account slots by id. Slots are never removed.
    slots: DashMap<AccountId, Arc<AccountSlot>>,
}

impl AccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Provision a new account with zero balance and active status
    ///
    /// # Errors
    ///
    /// Returns `AccountExists` if the id is already taken.
    pub fn provision(&self, id: AccountId, secret_hash: SecretHash) -> Result<Account, LedgerError> {
        match self.slots.entry(id) {
            Entry::Occupied(_) => Err(LedgerError::account_exists(id)),
            Entry::Vacant(vacant) => {
                let account = Account::new(id, secret_hash);
                vacant.insert(Arc::new(AccountSlot::new(account.clone())));
                Ok(account)
            }
        }
    }

    /// Get the last published state of an account
    ///
    /// Never waits for a row lock. The returned value is a snapshot and may be
    /// superseded as soon as this returns.
    pub fn get(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.slot(id).map(|slot| slot.state.read().clone())
    }

    /// Whether an account with this id exists
    pub fn contains(&self, id: AccountId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of provisioned accounts
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no account has been provisioned
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of every account, sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        let slots: Vec<Arc<AccountSlot>> = self
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut accounts: Vec<Account> = slots.iter().map(|slot| slot.state.read().clone()).collect();
        accounts.sort_by_key(|account| account.id);
        accounts
    }

    /// Sum of all published balances
    pub fn total_balance(&self) -> Decimal {
        self.accounts().iter().map(|account| account.balance).sum()
    }

    /// Acquire the row locks of a set of accounts
    ///
    /// Ids are deduplicated and locked in ascending order. Every id is
    /// resolved before the first lock is taken. The whole set must be
    /// acquired within `timeout`; on failure every lock taken so far is
    /// released.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if any id is unknown (no lock taken)
    /// - `LockTimeout` if the set could not be acquired in time
    pub fn lock_for_update(&self, ids: &[AccountId], timeout: Duration) -> Result<LockSet, LedgerError> {
        let slots = lock_order(ids.iter().copied())
            .into_iter()
            .map(|id| self.slot(id).map(|slot| (id, slot)))
            .collect::<Result<Vec<_>, _>>()?;

        let deadline = Instant::now().checked_add(timeout);
        let mut entries = Vec::with_capacity(slots.len());

        for (id, slot) in slots {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => timeout,
            };
            let guard = slot
                .row
                .try_lock_arc_for(remaining)
                .ok_or_else(|| LedgerError::lock_timeout(timeout))?;
            // Only row-lock holders publish, so this read is authoritative
            let working = slot.state.read().clone();
            entries.push(LockedAccount {
                id,
                slot,
                working,
                _guard: guard,
            });
        }

        Ok(LockSet { entries })
    }

    /// Deactivate an account
    ///
    /// Takes the account's row lock with the same bounded wait as a transfer.
    /// Deactivating an already inactive account is a no-op.
    pub fn deactivate(&self, id: AccountId, timeout: Duration) -> Result<Account, LedgerError> {
        let mut locks = self.lock_for_update(&[id], timeout)?;
        let index = locks.position(id)?;
        locks.entries[index].working.status = AccountStatus::Inactive;
        let account = locks.entries[index].working.clone();
        locks.publish();
        Ok(account)
    }

    fn slot(&self, id: AccountId) -> Result<Arc<AccountSlot>, LedgerError> {
        self.slots
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| LedgerError::account_not_found(id))
    }
}

struct LockedAccount {
    id: AccountId,
    slot: Arc<AccountSlot>,
    working: Account,
    _guard: RowGuard,
}

/// A set of accounts whose row locks are held
///
/// Balance changes are applied to private working copies. [`LockSet::publish`]
/// makes them visible; dropping the set discards them. Either way the row
/// locks are released when the set goes away.
pub struct LockSet {
    /// Locked accounts, sorted by id
    entries: Vec<LockedAccount>,
}

impl LockSet {
    /// Ids of the locked accounts in acquisition order
    pub fn ids(&self) -> Vec<AccountId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Working state of a locked account
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account is not part of this set.
    pub fn account(&self, id: AccountId) -> Result<&Account, LedgerError> {
        self.position(id).map(|index| &self.entries[index].working)
    }

    /// Adjust a locked account's working balance by a signed amount
    ///
    /// Leaves the working state untouched on error.
    ///
    /// # Errors
    ///
    /// - `AccountNotFound` if the account is not part of this set
    /// - `AccountInactive` if the account is not active
    /// - `InsufficientFunds` if the balance would become negative
    /// - `ArithmeticOverflow` if the balance would overflow
    pub fn apply_delta(&mut self, id: AccountId, delta: Decimal) -> Result<(), LedgerError> {
        let index = self.position(id)?;
        let account = &mut self.entries[index].working;

        account.ensure_active()?;

        let next = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| LedgerError::arithmetic_overflow(id))?;

        if next < Decimal::ZERO {
            return Err(LedgerError::insufficient_funds(id, account.balance, -delta));
        }

        account.balance = next;
        Ok(())
    }

    /// Publish every working state, then release the row locks
    pub fn publish(self) {
        for entry in self.entries {
            *entry.slot.state.write() = entry.working;
        }
    }

    fn position(&self, id: AccountId) -> Result<usize, LedgerError> {
        self.entries
            .binary_search_by_key(&id, |entry| entry.id)
            .map_err(|_| LedgerError::account_not_found(id))
    }
}

impl fmt::Debug for LockSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockSet").field("ids", &self.ids()).finish()
    }
}
