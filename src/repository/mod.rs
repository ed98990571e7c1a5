//! Ledger store contracts and their backends
//!
//! The borrowing engine only talks to the copies ledger and the loan ledger
//! through a [`LedgerTransaction`] obtained from a [`LedgerStore`]. Every read
//! and write inside one checkout/return/renewal goes through the same
//! transaction, so the store's isolation is the only synchronization point.

pub mod memory;
pub mod postgres;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::{
    error::AppResult,
    models::{CopyRecord, LoanKey, LoanRecord, LoanView},
};

pub use memory::MemoryLedgerStore;
pub use postgres::PgLedgerStore;

/// Lazy sequence of joined loan rows
pub type LoanStream<'a> = Pin<Box<dyn Stream<Item = AppResult<LoanView>> + Send + 'a>>;

/// Source of transactions over the copies and loan ledgers
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a new unit of work
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>>;

    /// Stream every active loan joined with book, branch and borrower identity.
    /// Ordering is whatever the store yields.
    async fn list_loans(&self) -> AppResult<LoanStream<'_>>;
}

/// One open unit of work against both ledgers.
///
/// Nothing written through a transaction is visible to other transactions
/// until [`commit`](LedgerTransaction::commit). After `commit` or `rollback`
/// the transaction is finished and further calls fail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerTransaction: Send {
    /// Read the copies row for (book, branch) and hold it locked until the
    /// transaction finishes.
    async fn lock_copies(&mut self, book_id: i32, branch_id: i32) -> AppResult<Option<CopyRecord>>;

    /// Returns `false` when a row for (book, branch) already exists. Fails with
    /// `CatalogRecordNotFound` if the book or branch is unknown to the store.
    async fn insert_copies(&mut self, copies: CopyRecord) -> AppResult<bool>;

    /// Returns `false` when no row matched
    async fn update_copies(&mut self, copies: CopyRecord) -> AppResult<bool>;

    /// All loan rows stored under `key`. More than one means the ledger is corrupt.
    async fn find_loans(&mut self, key: LoanKey) -> AppResult<Vec<LoanRecord>>;

    /// Fails with `DuplicateLoan` if a loan already exists for the key, and
    /// with `BorrowerNotFound` if the store knows no such card.
    async fn create_loan(&mut self, loan: LoanRecord) -> AppResult<()>;

    /// Returns `false` when no row matched
    async fn update_loan(&mut self, loan: LoanRecord) -> AppResult<bool>;

    /// Returns `false` when no row matched
    async fn delete_loan(&mut self, key: LoanKey) -> AppResult<bool>;

    async fn commit(&mut self) -> AppResult<()>;

    async fn rollback(&mut self) -> AppResult<()>;
}
