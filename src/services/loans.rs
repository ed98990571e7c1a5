//! Borrowing transaction engine
//!
//! Checkout, return and renewal each run inside one ledger transaction: the
//! availability check and the paired copies/loan mutation are committed
//! together or rolled back together.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{CopyRecord, LoanKey, LoanRecord},
    repository::{LedgerStore, LedgerTransaction, LoanStream},
};

/// What a renewal does with the loan's `date_out`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalPolicy {
    /// Keep the original checkout timestamp
    #[default]
    KeepDateOut,
    /// Move `date_out` to the moment of renewal
    RefreshDateOut,
}

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone)]
pub struct BorrowingEngine {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    renewal_policy: RenewalPolicy,
}

impl BorrowingEngine {
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, renewal_policy: RenewalPolicy) -> Self {
        Self {
            store,
            clock,
            renewal_policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn renewal_policy(&self) -> RenewalPolicy {
        self.renewal_policy
    }

    /// Check a copy out to a borrower.
    ///
    /// Decrements the branch's available count and records the loan. Fails
    /// with `InvalidDueDate` unless `due_date` falls after `now`'s date.
    pub async fn checkout(&self, key: LoanKey, now: DateTime<Utc>, due_date: NaiveDate) -> AppResult<LoanRecord> {
        let today = now.date_naive();
        if due_date <= today {
            return Err(AppError::InvalidDueDate { today, due_date });
        }

        let mut tx = self.store.begin().await?;
        let result = checkout_in(tx.as_mut(), key, ledger_timestamp(now), due_date).await;
        let loan = finish(tx, result, "checkout").await?;

        tracing::info!(
            event = "checkout",
            book_id = key.book_id,
            branch_id = key.branch_id,
            card_no = key.card_no,
            due_date = %loan.due_date,
            "Book checked out"
        );
        Ok(loan)
    }

    /// Return a checked-out copy. Returns the copies row after the increment.
    pub async fn return_loan(&self, key: LoanKey) -> AppResult<CopyRecord> {
        let mut tx = self.store.begin().await?;
        let result = return_in(tx.as_mut(), key).await;
        let copies = finish(tx, result, "return").await?;

        tracing::info!(
            event = "return",
            book_id = key.book_id,
            branch_id = key.branch_id,
            card_no = key.card_no,
            available = copies.no_of_available_copies,
            "Book returned"
        );
        Ok(copies)
    }

    /// Push a loan's due date forward. Inventory is not touched.
    pub async fn renew(&self, key: LoanKey, new_due_date: NaiveDate) -> AppResult<LoanRecord> {
        let renewed_at = match self.renewal_policy {
            RenewalPolicy::KeepDateOut => None,
            RenewalPolicy::RefreshDateOut => Some(ledger_timestamp(self.clock.now())),
        };

        let mut tx = self.store.begin().await?;
        let result = renew_in(tx.as_mut(), key, new_due_date, renewed_at).await;
        let loan = finish(tx, result, "renewal").await?;

        tracing::info!(
            event = "renewal",
            book_id = key.book_id,
            branch_id = key.branch_id,
            card_no = key.card_no,
            due_date = %loan.due_date,
            "Loan renewed"
        );
        Ok(loan)
    }

    /// Fetch the loan for `key`. Absence is `Ok(None)`.
    pub async fn lookup(&self, key: LoanKey) -> AppResult<Option<LoanRecord>> {
        let mut tx = self.store.begin().await?;
        let result = find_unique(tx.as_mut(), key).await;
        finish(tx, result, "lookup").await
    }

    /// Every active loan with its book, branch and borrower
    pub fn list_all(&self) -> LoanListing<'_> {
        LoanListing {
            store: self.store.as_ref(),
        }
    }

    /// Set the number of copies a branch owns, keeping outstanding loans out
    /// of the available count. Creates the copies row if it is missing.
    pub async fn set_copies(&self, book_id: i32, branch_id: i32, no_of_copies: i32) -> AppResult<CopyRecord> {
        if no_of_copies < 0 {
            return Err(AppError::BadRequest(format!(
                "Copy count must not be negative, got {}",
                no_of_copies
            )));
        }

        let mut tx = self.store.begin().await?;
        let result = set_copies_in(tx.as_mut(), book_id, branch_id, no_of_copies).await;
        let copies = finish(tx, result, "set_copies").await?;

        tracing::info!(
            event = "set_copies",
            book_id,
            branch_id,
            total = copies.no_of_copies,
            available = copies.no_of_available_copies,
            "Copies updated"
        );
        Ok(copies)
    }

    /// Round-trip a transaction to check the store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        let mut tx = self.store.begin().await?;
        tx.rollback().await
    }
}

/// Restartable view over all active loans; every call to [`stream`](Self::stream)
/// reads the ledger afresh.
pub struct LoanListing<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> LoanListing<'a> {
    pub async fn stream(&self) -> AppResult<LoanStream<'a>> {
        self.store.list_loans().await
    }
}

/// Timestamps are stored with microsecond precision
fn ledger_timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(6)
}

/// Commit on success, roll back on failure
async fn finish<T>(mut tx: Box<dyn LedgerTransaction>, result: AppResult<T>, operation: &'static str) -> AppResult<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let AppError::LedgerInconsistency(detail) = &err {
                tracing::error!(operation, "Ledger inconsistency: {}", detail);
            }
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(operation, "Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

fn ensure_consistent(copies: &CopyRecord) -> AppResult<()> {
    if copies.is_consistent() {
        Ok(())
    } else {
        Err(AppError::LedgerInconsistency(format!(
            "book {} at branch {} has {} of {} copies available",
            copies.book_id, copies.branch_id, copies.no_of_available_copies, copies.no_of_copies
        )))
    }
}

async fn find_unique(tx: &mut dyn LedgerTransaction, key: LoanKey) -> AppResult<Option<LoanRecord>> {
    let mut loans = tx.find_loans(key).await?;
    if loans.len() > 1 {
        return Err(AppError::LedgerInconsistency(format!(
            "{} loans stored for book {} at branch {} and card {}",
            loans.len(),
            key.book_id,
            key.branch_id,
            key.card_no
        )));
    }
    Ok(loans.pop())
}

async fn checkout_in(
    tx: &mut dyn LedgerTransaction,
    key: LoanKey,
    now: DateTime<Utc>,
    due_date: NaiveDate,
) -> AppResult<LoanRecord> {
    let mut copies = tx
        .lock_copies(key.book_id, key.branch_id)
        .await?
        .ok_or(AppError::CopyRecordNotFound {
            book_id: key.book_id,
            branch_id: key.branch_id,
        })?;
    ensure_consistent(&copies)?;

    if find_unique(tx, key).await?.is_some() {
        return Err(AppError::DuplicateLoan {
            book_id: key.book_id,
            branch_id: key.branch_id,
            card_no: key.card_no,
        });
    }

    if copies.no_of_available_copies == 0 {
        return Err(AppError::NoCopiesAvailable {
            book_id: key.book_id,
            branch_id: key.branch_id,
        });
    }

    copies.no_of_available_copies -= 1;
    if !tx.update_copies(copies).await? {
        return Err(copies_vanished(key.book_id, key.branch_id));
    }

    let loan = LoanRecord::new(key, now, due_date);
    tx.create_loan(loan.clone()).await?;
    Ok(loan)
}

async fn return_in(tx: &mut dyn LedgerTransaction, key: LoanKey) -> AppResult<CopyRecord> {
    if find_unique(tx, key).await?.is_none() {
        return Err(loan_not_found(key));
    }

    let mut copies = tx
        .lock_copies(key.book_id, key.branch_id)
        .await?
        .ok_or_else(|| {
            AppError::LedgerInconsistency(format!(
                "loan exists for book {} at branch {} but the branch has no copies row",
                key.book_id, key.branch_id
            ))
        })?;
    ensure_consistent(&copies)?;

    if copies.no_of_available_copies >= copies.no_of_copies {
        return Err(AppError::LedgerInconsistency(format!(
            "returning book {} to branch {} would exceed its {} copies",
            key.book_id, key.branch_id, copies.no_of_copies
        )));
    }

    // Lost a race with a concurrent return of the same loan
    if !tx.delete_loan(key).await? {
        return Err(loan_not_found(key));
    }

    copies.no_of_available_copies += 1;
    if !tx.update_copies(copies).await? {
        return Err(copies_vanished(key.book_id, key.branch_id));
    }
    Ok(copies)
}

async fn renew_in(
    tx: &mut dyn LedgerTransaction,
    key: LoanKey,
    new_due_date: NaiveDate,
    renewed_at: Option<DateTime<Utc>>,
) -> AppResult<LoanRecord> {
    let mut loan = find_unique(tx, key)
        .await?
        .ok_or_else(|| loan_not_found(key))?;

    if new_due_date <= loan.due_date {
        return Err(AppError::InvalidRenewalDate {
            current: loan.due_date,
            requested: new_due_date,
        });
    }

    loan.due_date = new_due_date;
    if let Some(at) = renewed_at {
        loan.date_out = at;
    }

    if !tx.update_loan(loan.clone()).await? {
        return Err(loan_not_found(key));
    }
    Ok(loan)
}

fn loan_not_found(key: LoanKey) -> AppError {
    AppError::LoanNotFound {
        book_id: key.book_id,
        branch_id: key.branch_id,
        card_no: key.card_no,
    }
}

async fn set_copies_in(
    tx: &mut dyn LedgerTransaction,
    book_id: i32,
    branch_id: i32,
    no_of_copies: i32,
) -> AppResult<CopyRecord> {
    let existing = match tx.lock_copies(book_id, branch_id).await? {
        Some(existing) => existing,
        None => {
            let copies = CopyRecord::new(book_id, branch_id, no_of_copies, no_of_copies);
            if tx.insert_copies(copies).await? {
                return Ok(copies);
            }
            // Created by a concurrent set_copies since the first read
            tx.lock_copies(book_id, branch_id)
                .await?
                .ok_or_else(|| copies_vanished(book_id, branch_id))?
        }
    };

    ensure_consistent(&existing)?;
    let outstanding = existing.outstanding();
    if no_of_copies < outstanding {
        return Err(AppError::InsufficientCopies {
            requested: no_of_copies,
            outstanding,
        });
    }
    let copies = CopyRecord::new(book_id, branch_id, no_of_copies, no_of_copies - outstanding);
    if !tx.update_copies(copies).await? {
        return Err(copies_vanished(book_id, branch_id));
    }
    Ok(copies)
}

fn copies_vanished(book_id: i32, branch_id: i32) -> AppError {
    AppError::LedgerInconsistency(format!(
        "copies row for book {} at branch {} vanished while locked",
        book_id, branch_id
    ))
}
