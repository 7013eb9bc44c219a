//! Concurrency integration tests
//!
//! These tests drive one shared executor from many threads and check the
//! ledger's guarantees afterwards:
//! - No balance is ever observed below zero
//! - Transfers conserve the sum of balances
//! - Contended transfers serialize without lost updates
//! - Opposite-order transfers never deadlock
//! - Every committed leg has exactly one ledger record
//! - Batches are all-or-nothing
//! - Lock waits are bounded

use rstest::rstest;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use transfer_ledger::core::{
    AccountStore, AuthorizationGate, ExecutorConfig, InMemoryBackend, Ledger, StorageBackend,
    TransferExecutor, UnitOfWork,
};
use transfer_ledger::types::{
    AccountId, Authorization, Credential, LedgerError, SecretHash, TransferLeg,
};

/// Gate accepting any credential except "deny"
struct AllowAll;

impl AuthorizationGate for AllowAll {
    fn authorize(&self, _account: AccountId, credential: &Credential) -> Authorization {
        if credential.expose() == "deny" {
            Authorization::Denied
        } else {
            Authorization::Authorized
        }
    }
}

type Executor = TransferExecutor<InMemoryBackend, AllowAll>;

fn setup_with(ledger: Ledger, lock_timeout: Duration, balances: &[(AccountId, i64)]) -> Executor {
    let backend = InMemoryBackend::with_parts(Arc::new(AccountStore::new()), Arc::new(ledger));
    for &(id, _) in balances {
        backend
            .accounts()
            .provision(id, SecretHash::new("unused"))
            .unwrap();
    }
    let executor = TransferExecutor::new(backend, AllowAll, ExecutorConfig { lock_timeout });
    for &(id, balance) in balances {
        if balance > 0 {
            executor.deposit(id, dec(balance), &pin()).unwrap();
        }
    }
    executor
}

fn setup(balances: &[(AccountId, i64)]) -> Executor {
    setup_with(Ledger::new(), Duration::from_secs(10), balances)
}

fn dec(value: i64) -> Decimal {
    Decimal::new(value, 0)
}

fn pin() -> Credential {
    Credential::new("1234")
}

fn balance(executor: &Executor, id: AccountId) -> Decimal {
    executor.backend().get(id).unwrap().balance
}

fn total(executor: &Executor) -> Decimal {
    executor.backend().accounts().total_balance()
}

/// Rebuild balances from the ledger alone
fn replay(executor: &Executor) -> HashMap<AccountId, Decimal> {
    let mut balances: HashMap<AccountId, Decimal> = HashMap::new();
    for record in executor.backend().ledger().list_all() {
        if let Some(source) = record.source {
            *balances.entry(source).or_default() -= record.amount;
        }
        *balances.entry(record.destination).or_default() += record.amount;
    }
    balances
}

fn assert_ledger_matches_balances(executor: &Executor) {
    let replayed = replay(executor);
    for account in executor.backend().accounts().accounts() {
        assert_eq!(
            replayed.get(&account.id).copied().unwrap_or_default(),
            account.balance,
            "ledger replay disagrees with balance of account {}",
            account.id
        );
    }
}

/// Deterministic pseudo-random sequence for spreading transfers over accounts
fn next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    *state >> 33
}

#[test]
fn test_example_transfer_then_insufficient_funds() {
    let executor = setup(&[(1, 100), (2, 0)]);
    let records_before = executor.backend().ledger().len();

    let record = executor.execute(1, 2, dec(100), &pin()).unwrap();
    let second = executor.execute(1, 2, dec(1), &pin());

    assert_eq!((record.source, record.destination, record.amount), (Some(1), 2, dec(100)));
    assert!(matches!(second, Err(LedgerError::InsufficientFunds { account: 1, .. })));
    assert_eq!(balance(&executor, 1), Decimal::ZERO);
    assert_eq!(balance(&executor, 2), dec(100));
    assert_eq!(executor.backend().ledger().len(), records_before + 1);
}

#[test]
fn test_example_batch_over_balance_aborts() {
    let executor = setup(&[(1, 50), (2, 0), (3, 0)]);
    let records_before = executor.backend().ledger().len();

    let result = executor.execute_batch(
        1,
        &[TransferLeg::new(2, dec(30)), TransferLeg::new(3, dec(30))],
        &pin(),
    );

    assert!(matches!(result, Err(LedgerError::InsufficientFunds { account: 1, .. })));
    assert_eq!(balance(&executor, 1), dec(50));
    assert_eq!(balance(&executor, 2), Decimal::ZERO);
    assert_eq!(balance(&executor, 3), Decimal::ZERO);
    assert_eq!(executor.backend().ledger().len(), records_before);
}

#[rstest]
#[case::small(8)]
#[case::large(64)]
fn test_contended_source_serializes_exactly(#[case] n: u64) {
    // X holds exactly n; n + 1 concurrent transfers of 1 to distinct accounts
    let mut balances = vec![(0, n as i64)];
    balances.extend((1..=n + 1).map(|id| (id, 0)));
    let executor = setup(&balances);
    let insufficient = AtomicUsize::new(0);
    let succeeded = AtomicUsize::new(0);

    thread::scope(|scope| {
        for to in 1..=n + 1 {
            let executor = &executor;
            let insufficient = &insufficient;
            let succeeded = &succeeded;
            scope.spawn(move || match executor.execute(0, to, Decimal::ONE, &pin()) {
                Ok(_) => {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }
                Err(LedgerError::InsufficientFunds { .. }) => {
                    insufficient.fetch_add(1, Ordering::SeqCst);
                }
                Err(other) => panic!("unexpected error: {}", other),
            });
        }
    });

    assert_eq!(succeeded.load(Ordering::SeqCst), n as usize);
    assert_eq!(insufficient.load(Ordering::SeqCst), 1);
    assert_eq!(balance(&executor, 0), Decimal::ZERO);
    assert_eq!(total(&executor), Decimal::new(n as i64, 0));
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_opposite_direction_transfers_do_not_deadlock() {
    let executor = setup(&[(1, 1_000), (2, 1_000)]);

    thread::scope(|scope| {
        for (from, to) in [(1, 2), (2, 1), (1, 2), (2, 1)] {
            let executor = &executor;
            scope.spawn(move || {
                for _ in 0..500 {
                    match executor.execute(from, to, Decimal::ONE, &pin()) {
                        Ok(_) | Err(LedgerError::InsufficientFunds { .. }) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            });
        }
    });

    assert_eq!(total(&executor), dec(2_000));
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_random_transfers_conserve_funds_and_never_go_negative() {
    const ACCOUNTS: u64 = 10;
    let balances: Vec<(AccountId, i64)> = (0..ACCOUNTS).map(|id| (id, 50)).collect();
    let executor = setup(&balances);
    let committed = AtomicUsize::new(0);
    let records_before = executor.backend().ledger().len();
    let running = AtomicUsize::new(8);

    thread::scope(|scope| {
        for worker in 0..8u64 {
            let executor = &executor;
            let committed = &committed;
            let running = &running;
            scope.spawn(move || {
                let mut state = worker + 1;
                for _ in 0..400 {
                    let from = next(&mut state) % ACCOUNTS;
                    let to = (from + 1 + next(&mut state) % (ACCOUNTS - 1)) % ACCOUNTS;
                    let amount = Decimal::new((next(&mut state) % 2_000 + 1) as i64, 2);
                    match executor.execute(from, to, amount, &pin()) {
                        Ok(_) => {
                            committed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::InsufficientFunds { .. }) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
                running.fetch_sub(1, Ordering::SeqCst);
            });
        }

        // Non-locking reads while transfers run
        let executor = &executor;
        let running = &running;
        scope.spawn(move || {
            while running.load(Ordering::SeqCst) > 0 {
                for id in 0..ACCOUNTS {
                    assert!(balance(executor, id) >= Decimal::ZERO);
                }
            }
        });
    });

    assert_eq!(total(&executor), dec(50 * ACCOUNTS as i64));
    for id in 0..ACCOUNTS {
        assert!(balance(&executor, id) >= Decimal::ZERO);
    }
    assert_eq!(
        executor.backend().ledger().len(),
        records_before + committed.load(Ordering::SeqCst)
    );
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_sequences_are_unique_and_increasing() {
    let executor = setup(&[(1, 500), (2, 500), (3, 500)]);

    thread::scope(|scope| {
        for (from, to) in [(1, 2), (2, 3), (3, 1)] {
            let executor = &executor;
            scope.spawn(move || {
                for _ in 0..100 {
                    executor.execute(from, to, Decimal::ONE, &pin()).unwrap();
                }
            });
        }
    });

    let sequences: Vec<u64> = executor
        .backend()
        .ledger()
        .list_all()
        .iter()
        .map(|record| record.sequence)
        .collect();
    let expected: Vec<u64> = (1..=sequences.len() as u64).collect();
    assert_eq!(sequences, expected);
}

#[test]
fn test_concurrent_batches_are_all_or_nothing() {
    let executor = setup(&[(1, 100), (2, 100), (3, 0), (4, 0), (5, 0)]);
    let committed_batches = AtomicUsize::new(0);

    thread::scope(|scope| {
        for from in [1, 2] {
            let executor = &executor;
            let committed_batches = &committed_batches;
            scope.spawn(move || {
                for _ in 0..20 {
                    let legs = [
                        TransferLeg::new(3, dec(2)),
                        TransferLeg::new(4, dec(2)),
                        TransferLeg::new(5, dec(2)),
                    ];
                    match executor.execute_batch(from, &legs, &pin()) {
                        Ok(receipt) => {
                            assert_eq!(receipt.records.len(), 3);
                            committed_batches.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::InsufficientFunds { .. }) => {}
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            });
        }
        // Competing single transfers drain the sources
        let executor = &executor;
        scope.spawn(move || {
            for _ in 0..30 {
                let _ = executor.execute(1, 2, dec(3), &pin());
                let _ = executor.execute(2, 1, dec(1), &pin());
            }
        });
    });

    let mut legs_per_batch: HashMap<uuid::Uuid, usize> = HashMap::new();
    for record in executor.backend().ledger().list_all() {
        if let Some(batch) = record.batch {
            *legs_per_batch.entry(batch).or_default() += 1;
        }
    }
    assert_eq!(legs_per_batch.len(), committed_batches.load(Ordering::SeqCst));
    assert!(legs_per_batch.values().all(|&legs| legs == 3));
    assert_eq!(total(&executor), dec(200));
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_lock_timeout_while_account_is_held() {
    let executor = setup_with(Ledger::new(), Duration::from_millis(50), &[(1, 10), (2, 0)]);
    let held = executor
        .backend()
        .accounts()
        .lock_for_update(&[2], Duration::from_secs(1))
        .unwrap();

    let result = thread::scope(|scope| {
        scope
            .spawn(|| executor.execute(1, 2, Decimal::ONE, &pin()))
            .join()
            .unwrap()
    });

    assert_eq!(result, Err(LedgerError::LockTimeout { waited_ms: 50 }));
    assert_eq!(balance(&executor, 1), dec(10));

    drop(held);
    assert!(executor.execute(1, 2, Decimal::ONE, &pin()).is_ok());
}

#[test]
fn test_disjoint_transfer_proceeds_while_other_unit_is_open() {
    let executor = setup_with(
        Ledger::new(),
        Duration::from_millis(50),
        &[(1, 10), (2, 0), (3, 10), (4, 0)],
    );
    let mut open_unit = executor.backend().begin_unit(&[1, 2], Duration::from_secs(1)).unwrap();
    open_unit.apply_delta(1, dec(-5)).unwrap();

    let result = thread::scope(|scope| {
        scope
            .spawn(|| executor.execute(3, 4, dec(7), &pin()))
            .join()
            .unwrap()
    });

    assert!(result.is_ok());
    assert_eq!(balance(&executor, 4), dec(7));
    drop(open_unit);
    assert_eq!(balance(&executor, 1), dec(10));
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_ledger_capacity_failures_leave_no_partial_effect() {
    // Two setup deposits plus 20 transfers fit
    let executor = setup_with(
        Ledger::with_capacity(22),
        Duration::from_secs(10),
        &[(1, 100), (2, 100)],
    );
    let committed = AtomicUsize::new(0);
    let refused = AtomicUsize::new(0);

    thread::scope(|scope| {
        for (from, to) in [(1, 2), (2, 1)] {
            let executor = &executor;
            let committed = &committed;
            let refused = &refused;
            scope.spawn(move || {
                for _ in 0..20 {
                    match executor.execute(from, to, Decimal::ONE, &pin()) {
                        Ok(_) => {
                            committed.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(LedgerError::LedgerWriteFailed { .. }) => {
                            refused.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(other) => panic!("unexpected error: {}", other),
                    }
                }
            });
        }
    });

    assert_eq!(committed.load(Ordering::SeqCst), 20);
    assert_eq!(refused.load(Ordering::SeqCst), 20);
    assert_eq!(total(&executor), dec(200));
    assert_ledger_matches_balances(&executor);
}

#[test]
fn test_denied_credential_never_touches_balances_under_load() {
    let executor = setup(&[(1, 100), (2, 100)]);

    thread::scope(|scope| {
        for _ in 0..4 {
            let executor = &executor;
            scope.spawn(move || {
                for _ in 0..50 {
                    let result = executor.execute(1, 2, Decimal::ONE, &Credential::new("deny"));
                    assert_eq!(result, Err(LedgerError::Unauthorized { account: 1 }));
                }
            });
        }
        let executor = &executor;
        scope.spawn(move || {
            for _ in 0..50 {
                executor.execute(2, 1, Decimal::ONE, &pin()).unwrap();
            }
        });
    });

    assert_eq!(balance(&executor, 1), dec(150));
    assert_eq!(balance(&executor, 2), dec(50));
}
