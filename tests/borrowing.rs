//! Borrowing engine scenarios against the in-memory ledger store

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tokio_test::{assert_err, assert_ok};

use lms_server::{
    error::{AppError, ErrorKind},
    models::{CopyRecord, LoanKey},
    repository::MemoryLedgerStore,
    services::loans::{BorrowingEngine, FixedClock, RenewalPolicy},
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
}

async fn setup(total: i32, available: i32) -> (MemoryLedgerStore, BorrowingEngine) {
    let store = MemoryLedgerStore::new();
    store.put_copies(CopyRecord::new(7, 3, total, available)).await;
    let engine = BorrowingEngine::new(
        Arc::new(store.clone()),
        Arc::new(FixedClock(now())),
        RenewalPolicy::default(),
    );
    (store, engine)
}

#[tokio::test]
async fn test_checkout_and_return_scenario() {
    let (store, engine) = setup(2, 2).await;
    let key = LoanKey::new(7, 3, 42);

    let loan = assert_ok!(engine.checkout(key, now(), due()).await);
    assert_eq!(loan.date_out, now());
    assert_eq!(loan.due_date, due());
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 1);
    assert_eq!(store.loan(key).await, Some(loan));

    assert_ok!(engine.return_loan(key).await);
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 2);
    assert_eq!(store.loan(key).await, None);
}

#[tokio::test]
async fn test_exhausted_branch_scenario() {
    let (store, engine) = setup(1, 0).await;

    let err = assert_err!(engine.checkout(LoanKey::new(7, 3, 42), now(), due()).await);
    assert!(matches!(err, AppError::NoCopiesAvailable { .. }));
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 0);
    assert_eq!(store.loan_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_of_last_copy() {
    let (store, engine) = setup(1, 1).await;

    let first = tokio::spawn({
        let engine = engine.clone();
        async move { engine.checkout(LoanKey::new(7, 3, 42), now(), due()).await }
    });
    let second = tokio::spawn({
        let engine = engine.clone();
        async move { engine.checkout(LoanKey::new(7, 3, 43), now(), due()).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results
        .iter()
        .filter(|r| matches!(r, Err(AppError::NoCopiesAvailable { .. })))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(exhausted, 1);
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 0);
    assert_eq!(store.loan_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_of_same_key() {
    let (store, engine) = setup(5, 5).await;
    let key = LoanKey::new(7, 3, 42);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.checkout(key, now(), due()).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(err) => assert!(matches!(err, AppError::DuplicateLoan { .. })),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(store.copies(7, 3).await.unwrap().no_of_available_copies, 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ledgers_agree_after_mixed_traffic() {
    let (store, engine) = setup(3, 3).await;

    let handles: Vec<_> = (0..40)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let key = LoanKey::new(7, 3, 100 + (i % 6));
                if i % 3 == 0 {
                    engine.return_loan(key).await.map(|_| ())
                } else {
                    engine.checkout(key, now(), due()).await.map(|_| ())
                }
            })
        })
        .collect();

    for handle in handles {
        if let Err(err) = handle.await.unwrap() {
            // only business-rule outcomes are expected
            assert!(matches!(err.kind(), ErrorKind::Conflict | ErrorKind::NotFound));
        }
    }

    let copies = store.copies(7, 3).await.unwrap();
    assert!(copies.is_consistent());
    assert_eq!(copies.outstanding() as usize, store.loan_count().await);
}

#[tokio::test]
async fn test_repeated_checkout_is_rejected_without_side_effects() {
    let (store, engine) = setup(2, 2).await;
    let key = LoanKey::new(7, 3, 42);

    assert_ok!(engine.checkout(key, now(), due()).await);
    let before = store.copies(7, 3).await;

    let err = assert_err!(engine.checkout(key, now(), due()).await);
    assert!(matches!(err, AppError::DuplicateLoan { .. }));
    assert_eq!(store.copies(7, 3).await, before);
    assert_eq!(store.loan_count().await, 1);
}
