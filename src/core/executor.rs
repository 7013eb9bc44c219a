//! Transfer execution
//!
//! This module provides the `TransferExecutor` struct, which runs single
//! transfers, batch transfers and deposits as all-or-nothing units.
//!
//! # State Machine
//!
//! Every attempt moves through
//! `RECEIVED → AUTHORIZING → LOCKING → VALIDATING → MUTATING → COMMITTING`
//! and ends `COMMITTED` or `ABORTED`:
//!
//! 1. **Received**: amounts and account ids are checked. Nothing is locked.
//! 2. **Authorizing**: the gate is consulted once. Nothing is locked.
//! 3. **Locking**: every involved account is locked in ascending id order,
//!    within the configured timeout.
//! 4. **Validating**: status and funds are re-checked under the locks; these
//!    checks are the authoritative ones.
//! 5. **Mutating**: balances are changed on the unit's working copies.
//! 6. **Committing**: records are staged and the unit commits balances and
//!    records together.
//!
//! Any failure drops the unit, which discards staged changes and releases
//! the locks.
//!
//! # Thread Safety
//!
//! The executor holds no mutable state of its own. It can be shared across
//! threads behind an `Arc` (or cloned when its parts are cheap to clone) and
//! driven concurrently; the backend's locks serialize attempts that share an
//! account.

use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::traits::{AuthorizationGate, StorageBackend, UnitOfWork};
use crate::types::{
    AccountId, BatchReceipt, Credential, LedgerError, LedgerRecord, PendingRecord, TransferLeg,
    TransferState, AMOUNT_SCALE,
};

/// Configuration for [`TransferExecutor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Bounded wait for acquiring all locks of one attempt
    pub lock_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(2000),
        }
    }
}

/// Orchestrates transfers over a storage backend and an authorization gate
#[derive(Debug, Clone)]
pub struct TransferExecutor<B, G> {
    backend: B,
    gate: G,
    config: ExecutorConfig,
}

impl<B, G> TransferExecutor<B, G>
where
    B: StorageBackend,
    G: AuthorizationGate,
{
    /// Create a new executor
    pub fn new(backend: B, gate: G, config: ExecutorConfig) -> Self {
        Self {
            backend,
            gate,
            config,
        }
    }

    /// The storage backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The authorization gate
    pub fn gate(&self) -> &G {
        &self.gate
    }

    /// The executor configuration
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Move `amount` from `from` to `to`
    ///
    /// # Returns
    ///
    /// The committed ledger record.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount`, `SameAccount`, `AccountNotFound` before any lock
    /// - `Unauthorized` if the gate does not authorize `from`
    /// - `LockTimeout` if the accounts could not be locked in time
    /// - `AccountInactive`, `InsufficientFunds` under lock
    /// - `LedgerWriteFailed` if the record could not be written
    ///
    /// Every error leaves balances and ledger exactly as they were.
    pub fn execute(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        credential: &Credential,
    ) -> Result<LedgerRecord, LedgerError> {
        let span = tracing::debug_span!("transfer", from, to, %amount);
        let _enter = span.enter();

        let result = self.run_transfer(from, to, amount, credential);
        self.finish(result)
    }

    fn run_transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: Decimal,
        credential: &Credential,
    ) -> Result<LedgerRecord, LedgerError> {
        transition(TransferState::Received);
        validate_amount(amount)?;
        if from == to {
            return Err(LedgerError::same_account(from));
        }
        self.ensure_exists(&[from, to])?;

        self.authorize(from, credential)?;

        transition(TransferState::Locking);
        let mut unit = self.backend.begin_unit(&[from, to], self.config.lock_timeout)?;

        transition(TransferState::Validating);
        unit.account(to)?.ensure_active()?;
        let source = unit.account(from)?;
        source.ensure_active()?;
        source.ensure_covers(amount)?;

        transition(TransferState::Mutating);
        unit.apply_delta(from, -amount)?;
        unit.apply_delta(to, amount)?;

        transition(TransferState::Committing);
        unit.append(PendingRecord {
            source: Some(from),
            destination: to,
            amount,
            batch: None,
        });
        let mut records = unit.commit()?;

        records
            .pop()
            .ok_or_else(|| LedgerError::ledger_write_failed("commit returned no record"))
    }

    /// Move funds from `from` to every leg's destination as one unit
    ///
    /// The source is debited once by the sum of all legs. Either every leg is
    /// credited and recorded, or none is.
    ///
    /// # Errors
    ///
    /// - `EmptyBatch`, `InvalidAmount`, `SameAccount`, `AccountNotFound`
    ///   before any lock, for any leg
    /// - `Unauthorized` if the gate does not authorize `from`
    /// - `LockTimeout` if the accounts could not be locked in time
    /// - `AccountInactive` if any involved account is inactive
    /// - `InsufficientFunds` if the source does not cover the total
    /// - `LedgerWriteFailed` if the records could not be written
    pub fn execute_batch(
        &self,
        from: AccountId,
        legs: &[TransferLeg],
        credential: &Credential,
    ) -> Result<BatchReceipt, LedgerError> {
        let batch_id = Uuid::new_v4();
        let span = tracing::debug_span!("batch_transfer", from, %batch_id, legs = legs.len());
        let _enter = span.enter();

        let result = self.run_batch(batch_id, from, legs, credential);
        self.finish(result)
    }

    fn run_batch(
        &self,
        batch_id: Uuid,
        from: AccountId,
        legs: &[TransferLeg],
        credential: &Credential,
    ) -> Result<BatchReceipt, LedgerError> {
        transition(TransferState::Received);
        if legs.is_empty() {
            return Err(LedgerError::empty_batch(from));
        }
        let mut total = Decimal::ZERO;
        for leg in legs {
            validate_amount(leg.amount)?;
            if leg.to == from {
                return Err(LedgerError::same_account(from));
            }
            total = total
                .checked_add(leg.amount)
                .ok_or_else(|| LedgerError::arithmetic_overflow(from))?;
        }
        let mut involved: Vec<AccountId> = legs.iter().map(|leg| leg.to).collect();
        involved.push(from);
        self.ensure_exists(&involved)?;

        self.authorize(from, credential)?;

        transition(TransferState::Locking);
        let mut unit = self.backend.begin_unit(&involved, self.config.lock_timeout)?;

        transition(TransferState::Validating);
        for leg in legs {
            unit.account(leg.to)?.ensure_active()?;
        }
        let source = unit.account(from)?;
        source.ensure_active()?;
        source.ensure_covers(total)?;

        transition(TransferState::Mutating);
        unit.apply_delta(from, -total)?;
        for leg in legs {
            unit.apply_delta(leg.to, leg.amount)?;
        }

        transition(TransferState::Committing);
        for leg in legs {
            unit.append(PendingRecord {
                source: Some(from),
                destination: leg.to,
                amount: leg.amount,
                batch: Some(batch_id),
            });
        }
        let records = unit.commit()?;

        Ok(BatchReceipt {
            batch_id,
            total,
            records,
        })
    }

    /// Credit external funds to `to`
    ///
    /// The credential is checked against `to`. The record has no source.
    ///
    /// # Errors
    ///
    /// Same as [`TransferExecutor::execute`], minus the funds check.
    pub fn deposit(
        &self,
        to: AccountId,
        amount: Decimal,
        credential: &Credential,
    ) -> Result<LedgerRecord, LedgerError> {
        let span = tracing::debug_span!("deposit", to, %amount);
        let _enter = span.enter();

        let result = self.run_deposit(to, amount, credential);
        self.finish(result)
    }

    fn run_deposit(
        &self,
        to: AccountId,
        amount: Decimal,
        credential: &Credential,
    ) -> Result<LedgerRecord, LedgerError> {
        transition(TransferState::Received);
        validate_amount(amount)?;
        self.ensure_exists(&[to])?;

        self.authorize(to, credential)?;

        transition(TransferState::Locking);
        let mut unit = self.backend.begin_unit(&[to], self.config.lock_timeout)?;

        transition(TransferState::Validating);
        unit.account(to)?.ensure_active()?;

        transition(TransferState::Mutating);
        unit.apply_delta(to, amount)?;

        transition(TransferState::Committing);
        unit.append(PendingRecord {
            source: None,
            destination: to,
            amount,
            batch: None,
        });
        let mut records = unit.commit()?;

        records
            .pop()
            .ok_or_else(|| LedgerError::ledger_write_failed("commit returned no record"))
    }

    fn ensure_exists(&self, ids: &[AccountId]) -> Result<(), LedgerError> {
        for &id in ids {
            self.backend.get(id)?;
        }
        Ok(())
    }

    fn authorize(&self, account: AccountId, credential: &Credential) -> Result<(), LedgerError> {
        transition(TransferState::Authorizing);
        let outcome = self.gate.authorize(account, credential);
        if outcome.is_authorized() {
            Ok(())
        } else {
            debug!(account, ?outcome, "authorization refused");
            Err(LedgerError::unauthorized(account))
        }
    }

    fn finish<T>(&self, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        match &result {
            Ok(_) => info!(state = %TransferState::Committed, "transfer committed"),
            Err(error) => warn!(
                state = %TransferState::Aborted,
                category = ?error.category(),
                %error,
                "transfer aborted"
            ),
        }
        result
    }
}

fn transition(state: TransferState) {
    debug!(%state, "transfer state");
}

/// Check that an amount is positive and has at most 4 decimal places
pub fn validate_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO || amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::invalid_amount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backend::InMemoryBackend;
    use crate::core::ledger::Ledger;
    use crate::core::AccountStore;
    use crate::types::{AccountStatus, Authorization, SecretHash};
    use rstest::rstest;
    use std::sync::Arc;

    const PIN: &str = "1234";

    /// Gate accepting one fixed PIN for every account
    struct FixedPinGate(&'static str);

    impl AuthorizationGate for FixedPinGate {
        fn authorize(&self, _account: AccountId, credential: &Credential) -> Authorization {
            if credential.expose() == self.0 {
                Authorization::Authorized
            } else {
                Authorization::Denied
            }
        }
    }

    /// Gate that always reports rate limiting
    struct RateLimitedGate;

    impl AuthorizationGate for RateLimitedGate {
        fn authorize(&self, _account: AccountId, _credential: &Credential) -> Authorization {
            Authorization::RateLimited
        }
    }

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn executor_with(ledger: Ledger, balances: &[(AccountId, i64)]) -> TransferExecutor<InMemoryBackend, FixedPinGate> {
        let backend = InMemoryBackend::with_parts(Arc::new(AccountStore::new()), Arc::new(ledger));
        for &(id, balance) in balances {
            backend.accounts().provision(id, SecretHash::new("hash")).unwrap();
            if balance > 0 {
                let mut unit = backend.begin_unit(&[id], Duration::from_secs(1)).unwrap();
                unit.apply_delta(id, dec(balance)).unwrap();
                unit.commit().unwrap();
            }
        }
        TransferExecutor::new(backend, FixedPinGate(PIN), ExecutorConfig::default())
    }

    fn executor(balances: &[(AccountId, i64)]) -> TransferExecutor<InMemoryBackend, FixedPinGate> {
        executor_with(Ledger::new(), balances)
    }

    fn balance<G: AuthorizationGate>(executor: &TransferExecutor<InMemoryBackend, G>, id: AccountId) -> Decimal {
        executor.backend().get(id).unwrap().balance
    }

    fn pin() -> Credential {
        Credential::new(PIN)
    }

    #[test]
    fn test_execute_moves_funds_and_records_once() {
        let executor = executor(&[(1, 100), (2, 0)]);

        let record = executor.execute(1, 2, dec(100), &pin()).unwrap();

        assert_eq!(balance(&executor, 1), Decimal::ZERO);
        assert_eq!(balance(&executor, 2), dec(100));
        assert_eq!(record.source, Some(1));
        assert_eq!(record.destination, 2);
        assert_eq!(record.amount, dec(100));
        assert_eq!(record.batch, None);
        assert_eq!(executor.backend().ledger().len(), 1);
    }

    #[test]
    fn test_execute_after_draining_fails_with_insufficient_funds() {
        let executor = executor(&[(1, 100), (2, 0)]);
        executor.execute(1, 2, dec(100), &pin()).unwrap();

        let result = executor.execute(1, 2, dec(1), &pin());

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                account: 1,
                available: Decimal::ZERO,
                requested: dec(1),
            })
        );
        assert_eq!(balance(&executor, 1), Decimal::ZERO);
        assert_eq!(balance(&executor, 2), dec(100));
        assert_eq!(executor.backend().ledger().len(), 1);
    }

    #[rstest]
    #[case::zero(Decimal::ZERO)]
    #[case::negative(dec(-5))]
    #[case::too_precise(Decimal::new(1, 5))]
    fn test_execute_rejects_invalid_amount(#[case] amount: Decimal) {
        let executor = executor(&[(1, 100), (2, 0)]);

        let result = executor.execute(1, 2, amount, &pin());

        assert_eq!(result, Err(LedgerError::InvalidAmount { amount }));
        assert!(executor.backend().ledger().is_empty());
    }

    #[test]
    fn test_execute_accepts_trailing_zero_precision() {
        let executor = executor(&[(1, 100), (2, 0)]);

        // 1.50000 normalizes to 1.5
        let result = executor.execute(1, 2, Decimal::new(150000, 5), &pin());

        assert!(result.is_ok());
        assert_eq!(balance(&executor, 2), Decimal::new(15, 1));
    }

    #[test]
    fn test_execute_rejects_same_account() {
        let executor = executor(&[(1, 100)]);

        let result = executor.execute(1, 1, dec(10), &pin());

        assert_eq!(result, Err(LedgerError::SameAccount { account: 1 }));
        assert_eq!(balance(&executor, 1), dec(100));
    }

    #[rstest]
    #[case::unknown_source(9, 2)]
    #[case::unknown_destination(1, 9)]
    fn test_execute_rejects_unknown_account(#[case] from: AccountId, #[case] to: AccountId) {
        let executor = executor(&[(1, 100), (2, 0)]);

        let result = executor.execute(from, to, dec(10), &pin());

        assert_eq!(result, Err(LedgerError::AccountNotFound { account: 9 }));
    }

    #[test]
    fn test_execute_wrong_credential_is_unauthorized() {
        let executor = executor(&[(1, 100), (2, 0)]);

        let result = executor.execute(1, 2, dec(10), &Credential::new("0000"));

        assert_eq!(result, Err(LedgerError::Unauthorized { account: 1 }));
        assert_eq!(balance(&executor, 1), dec(100));
        assert!(executor.backend().ledger().is_empty());
    }

    #[test]
    fn test_rate_limited_is_reported_as_unauthorized() {
        let backend = InMemoryBackend::new();
        backend.accounts().provision(1, SecretHash::new("hash")).unwrap();
        backend.accounts().provision(2, SecretHash::new("hash")).unwrap();
        let executor = TransferExecutor::new(backend, RateLimitedGate, ExecutorConfig::default());

        let result = executor.execute(1, 2, dec(10), &pin());

        assert_eq!(result, Err(LedgerError::Unauthorized { account: 1 }));
    }

    #[test]
    fn test_authorization_happens_before_locking() {
        let executor = executor(&[(1, 100), (2, 0)]);
        // Hold account 1 so that any lock attempt would time out
        let _held = executor
            .backend()
            .accounts()
            .lock_for_update(&[1], Duration::from_secs(1))
            .unwrap();

        let result = executor.execute(1, 2, dec(10), &Credential::new("0000"));

        assert_eq!(result, Err(LedgerError::Unauthorized { account: 1 }));
    }

    #[rstest]
    #[case::inactive_source(1)]
    #[case::inactive_destination(2)]
    fn test_execute_rejects_inactive_account(#[case] inactive: AccountId) {
        let executor = executor(&[(1, 100), (2, 0)]);
        executor
            .backend()
            .accounts()
            .deactivate(inactive, Duration::from_secs(1))
            .unwrap();

        let result = executor.execute(1, 2, dec(10), &pin());

        assert_eq!(result, Err(LedgerError::AccountInactive { account: inactive }));
        assert_eq!(balance(&executor, 1), dec(100));
        assert_eq!(balance(&executor, 2), Decimal::ZERO);
        assert_eq!(
            executor.backend().get(inactive).unwrap().status,
            AccountStatus::Inactive
        );
    }

    #[test]
    fn test_execute_times_out_on_held_lock() {
        let backend = InMemoryBackend::new();
        for id in [1, 2] {
            backend.accounts().provision(id, SecretHash::new("hash")).unwrap();
        }
        let config = ExecutorConfig {
            lock_timeout: Duration::from_millis(30),
        };
        let executor = TransferExecutor::new(backend, FixedPinGate(PIN), config);
        let _held = executor
            .backend()
            .accounts()
            .lock_for_update(&[2], Duration::from_secs(1))
            .unwrap();

        let result = executor.deposit(1, dec(5), &pin());
        assert!(result.is_ok());

        let result = executor.execute(1, 2, dec(5), &pin());

        assert_eq!(result, Err(LedgerError::LockTimeout { waited_ms: 30 }));
        assert_eq!(balance(&executor, 1), dec(5));
        assert_eq!(executor.backend().ledger().len(), 1);
    }

    #[test]
    fn test_execute_ledger_failure_leaves_balances_unchanged() {
        let executor = executor_with(Ledger::with_capacity(1), &[(1, 100), (2, 0)]);
        executor.execute(1, 2, dec(10), &pin()).unwrap();

        let result = executor.execute(1, 2, dec(10), &pin());

        assert!(matches!(result, Err(LedgerError::LedgerWriteFailed { .. })));
        assert_eq!(balance(&executor, 1), dec(90));
        assert_eq!(balance(&executor, 2), dec(10));
        assert_eq!(executor.backend().ledger().len(), 1);
    }

    #[test]
    fn test_batch_insufficient_total_aborts_every_leg() {
        let executor = executor(&[(1, 50), (2, 0), (3, 0)]);
        let legs = [TransferLeg::new(2, dec(30)), TransferLeg::new(3, dec(30))];

        let result = executor.execute_batch(1, &legs, &pin());

        assert_eq!(
            result,
            Err(LedgerError::InsufficientFunds {
                account: 1,
                available: dec(50),
                requested: dec(60),
            })
        );
        assert_eq!(balance(&executor, 1), dec(50));
        assert_eq!(balance(&executor, 2), Decimal::ZERO);
        assert_eq!(balance(&executor, 3), Decimal::ZERO);
        assert!(executor.backend().ledger().is_empty());
    }

    #[test]
    fn test_batch_applies_every_leg_with_shared_batch_id() {
        let executor = executor(&[(1, 100), (2, 0), (3, 0)]);
        let legs = [
            TransferLeg::new(2, dec(30)),
            TransferLeg::new(3, dec(50)),
            TransferLeg::new(2, dec(5)),
        ];

        let receipt = executor.execute_batch(1, &legs, &pin()).unwrap();

        assert_eq!(receipt.total, dec(85));
        assert_eq!(receipt.records.len(), 3);
        assert!(receipt
            .records
            .iter()
            .all(|record| record.batch == Some(receipt.batch_id) && record.source == Some(1)));
        let destinations: Vec<AccountId> = receipt.records.iter().map(|r| r.destination).collect();
        assert_eq!(destinations, vec![2, 3, 2]);
        assert_eq!(balance(&executor, 1), dec(15));
        assert_eq!(balance(&executor, 2), dec(35));
        assert_eq!(balance(&executor, 3), dec(50));
        assert_eq!(executor.backend().ledger().len(), 3);
    }

    #[test]
    fn test_batch_with_invalid_leg_aborts_before_anything() {
        let executor = executor(&[(1, 100), (2, 0), (3, 0)]);
        let legs = [TransferLeg::new(2, dec(10)), TransferLeg::new(3, dec(-1))];

        let result = executor.execute_batch(1, &legs, &pin());

        assert_eq!(result, Err(LedgerError::InvalidAmount { amount: dec(-1) }));
        assert_eq!(balance(&executor, 2), Decimal::ZERO);
        assert!(executor.backend().ledger().is_empty());
    }

    #[test]
    fn test_batch_leg_to_source_is_rejected() {
        let executor = executor(&[(1, 100), (2, 0)]);
        let legs = [TransferLeg::new(2, dec(10)), TransferLeg::new(1, dec(10))];

        let result = executor.execute_batch(1, &legs, &pin());

        assert_eq!(result, Err(LedgerError::SameAccount { account: 1 }));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        let executor = executor(&[(1, 100)]);

        let result = executor.execute_batch(1, &[], &pin());

        assert_eq!(result, Err(LedgerError::EmptyBatch { account: 1 }));
    }

    #[test]
    fn test_batch_with_inactive_destination_credits_nobody() {
        let executor = executor(&[(1, 100), (2, 0), (3, 0)]);
        executor
            .backend()
            .accounts()
            .deactivate(3, Duration::from_secs(1))
            .unwrap();
        let legs = [TransferLeg::new(2, dec(10)), TransferLeg::new(3, dec(10))];

        let result = executor.execute_batch(1, &legs, &pin());

        assert_eq!(result, Err(LedgerError::AccountInactive { account: 3 }));
        assert_eq!(balance(&executor, 1), dec(100));
        assert_eq!(balance(&executor, 2), Decimal::ZERO);
    }

    #[test]
    fn test_batch_ledger_failure_writes_no_leg() {
        let executor = executor_with(Ledger::with_capacity(2), &[(1, 100), (2, 0), (3, 0), (4, 0)]);
        let legs = [
            TransferLeg::new(2, dec(10)),
            TransferLeg::new(3, dec(10)),
            TransferLeg::new(4, dec(10)),
        ];

        let result = executor.execute_batch(1, &legs, &pin());

        assert!(matches!(result, Err(LedgerError::LedgerWriteFailed { .. })));
        assert_eq!(balance(&executor, 1), dec(100));
        assert!(executor.backend().ledger().is_empty());
    }

    #[test]
    fn test_batch_wrong_credential_is_unauthorized() {
        let executor = executor(&[(1, 100), (2, 0)]);

        let result = executor.execute_batch(1, &[TransferLeg::new(2, dec(1))], &Credential::new("9999"));

        assert_eq!(result, Err(LedgerError::Unauthorized { account: 1 }));
    }

    #[test]
    fn test_deposit_credits_and_records_without_source() {
        let executor = executor(&[(1, 0)]);

        let record = executor.deposit(1, Decimal::new(2550, 2), &pin()).unwrap();

        assert_eq!(record.source, None);
        assert_eq!(record.destination, 1);
        assert_eq!(balance(&executor, 1), Decimal::new(2550, 2));
        assert_eq!(executor.backend().ledger().list_by_account(1).iter().count(), 1);
    }

    #[test]
    fn test_deposit_into_inactive_account_fails() {
        let executor = executor(&[(1, 0)]);
        executor
            .backend()
            .accounts()
            .deactivate(1, Duration::from_secs(1))
            .unwrap();

        let result = executor.deposit(1, dec(10), &pin());

        assert_eq!(result, Err(LedgerError::AccountInactive { account: 1 }));
        assert!(executor.backend().ledger().is_empty());
    }

    #[rstest]
    #[case::one(dec(1), true)]
    #[case::four_places(Decimal::new(1, 4), true)]
    #[case::five_places(Decimal::new(1, 5), false)]
    #[case::zero(Decimal::ZERO, false)]
    #[case::negative(dec(-1), false)]
    fn test_validate_amount(#[case] amount: Decimal, #[case] valid: bool) {
        assert_eq!(validate_amount(amount).is_ok(), valid);
    }
}
