//! Command processing engine
//!
//! This module provides the `LedgerEngine`, which wires the account store,
//! ledger, PIN gate and transfer executor together and applies [`Command`]s
//! to them.
//!
//! The engine enforces the lifecycle rules that sit outside the executor:
//! - Opening an account hashes its PIN before the account becomes visible
//! - Lifecycle commands take the row lock with the executor's timeout

use std::sync::Arc;

use tracing::debug;

use super::account_store::AccountStore;
use super::authorization::{GateConfig, PinGate};
use super::backend::InMemoryBackend;
use super::executor::{ExecutorConfig, TransferExecutor};
use super::ledger::Ledger;
use crate::types::{Account, AccountId, Command, Credential, LedgerError};

/// Executor type used by [`LedgerEngine`]
pub type EngineExecutor = TransferExecutor<InMemoryBackend, Arc<PinGate>>;

/// Configuration for every component owned by a [`LedgerEngine`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub executor: ExecutorConfig,
    pub gate: GateConfig,
}

/// Command processing engine
///
/// All methods take `&self`; the engine can be shared across threads behind
/// an `Arc`.
pub struct LedgerEngine {
    accounts: Arc<AccountStore>,
    ledger: Arc<Ledger>,
    gate: Arc<PinGate>,
    executor: EngineExecutor,
}

impl LedgerEngine {
    /// Create an engine with an empty account store and an unbounded ledger
    ///
    /// # Errors
    ///
    /// Returns `CredentialHashing` if the gate's hash parameters are invalid.
    pub fn new(config: EngineConfig) -> Result<Self, LedgerError> {
        Self::with_ledger(config, Ledger::new())
    }

    /// Create an engine writing to the given ledger
    pub fn with_ledger(config: EngineConfig, ledger: Ledger) -> Result<Self, LedgerError> {
        let accounts = Arc::new(AccountStore::new());
        let ledger = Arc::new(ledger);
        let gate = Arc::new(PinGate::new(Arc::clone(&accounts), config.gate)?);
        let backend = InMemoryBackend::with_parts(Arc::clone(&accounts), Arc::clone(&ledger));
        let executor = TransferExecutor::new(backend, Arc::clone(&gate), config.executor);

        Ok(Self {
            accounts,
            ledger,
            gate,
            executor,
        })
    }

    /// Apply one command
    ///
    /// # Errors
    ///
    /// Returns the error of the underlying store or executor operation. A
    /// failed command changes nothing.
    pub fn apply(&self, command: &Command) -> Result<(), LedgerError> {
        debug!(kind = command.kind(), account = command.primary_account(), "applying command");

        match command {
            Command::Open {
                account,
                credential,
            } => self.open_account(*account, credential).map(|_| ()),
            Command::Deactivate { account } => self.deactivate(*account).map(|_| ()),
            Command::Deposit {
                to,
                amount,
                credential,
            } => self.executor.deposit(*to, *amount, credential).map(|_| ()),
            Command::Transfer {
                from,
                to,
                amount,
                credential,
            } => self
                .executor
                .execute(*from, *to, *amount, credential)
                .map(|_| ()),
            Command::Batch {
                from,
                legs,
                credential,
            } => self.executor.execute_batch(*from, legs, credential).map(|_| ()),
        }
    }

    /// Provision an active, empty account protected by `credential`
    ///
    /// # Errors
    ///
    /// - `MalformedCredential` unless the PIN is exactly 4 ASCII digits
    /// - `AccountExists` if the id is taken
    pub fn open_account(&self, id: AccountId, credential: &Credential) -> Result<Account, LedgerError> {
        let hash = self.gate.hash_credential(credential)?;
        self.accounts.provision(id, hash)
    }

    /// Mark an account inactive
    pub fn deactivate(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .deactivate(id, self.executor.config().lock_timeout)
    }

    /// The transfer executor
    pub fn executor(&self) -> &EngineExecutor {
        &self.executor
    }

    /// The account store
    pub fn account_store(&self) -> &Arc<AccountStore> {
        &self.accounts
    }

    /// The ledger
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Snapshot of every account, sorted by id
    pub fn get_accounts(&self) -> Vec<Account> {
        self.accounts.accounts()
    }
}
