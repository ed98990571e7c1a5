//! In-process ledger store
//!
//! A transaction owns the store's mutex guard from `begin` until it commits
//! or rolls back, so transactions are fully serialized. Writes go to a staged
//! copy of the ledgers and are published only on commit.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LedgerStore, LedgerTransaction, LoanStream};
use crate::{
    error::{AppError, AppResult},
    models::{
        Author, Book, BookSummary, Borrower, Branch, CopyRecord, LoanKey, LoanRecord, LoanView,
        Publisher,
    },
};

#[derive(Debug, Default, Clone)]
struct Ledgers {
    copies: BTreeMap<(i32, i32), CopyRecord>,
    loans: BTreeMap<LoanKey, LoanRecord>,
}

#[derive(Debug, Default)]
struct Catalog {
    books: HashMap<i32, Book>,
    authors: HashMap<i32, Author>,
    publishers: HashMap<i32, Publisher>,
    branches: HashMap<i32, Branch>,
    borrowers: HashMap<i32, Borrower>,
}

impl Catalog {
    /// Inner join of a loan with its book, branch and borrower
    fn view(&self, loan: &LoanRecord) -> Option<LoanView> {
        let book = self.books.get(&loan.book_id)?;
        let branch = self.branches.get(&loan.branch_id)?;
        let borrower = self.borrowers.get(&loan.card_no)?;
        Some(LoanView {
            book: BookSummary {
                id: book.id,
                title: book.title.clone(),
                author: book
                    .author_id
                    .and_then(|id| self.authors.get(&id))
                    .map(|a| a.name.clone()),
                publisher: book
                    .publisher_id
                    .and_then(|id| self.publishers.get(&id))
                    .map(|p| p.name.clone()),
            },
            branch: branch.clone(),
            borrower: borrower.clone(),
            date_out: loan.date_out,
            due_date: loan.due_date,
        })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    ledgers: Ledgers,
    catalog: Catalog,
}

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a copies row directly, bypassing any invariant checks
    pub async fn put_copies(&self, copies: CopyRecord) {
        self.state
            .lock()
            .await
            .ledgers
            .copies
            .insert((copies.book_id, copies.branch_id), copies);
    }

    /// Write a loan row directly, bypassing any invariant checks
    pub async fn put_loan(&self, loan: LoanRecord) {
        self.state.lock().await.ledgers.loans.insert(loan.key(), loan);
    }

    pub async fn copies(&self, book_id: i32, branch_id: i32) -> Option<CopyRecord> {
        self.state
            .lock()
            .await
            .ledgers
            .copies
            .get(&(book_id, branch_id))
            .copied()
    }

    pub async fn loan(&self, key: LoanKey) -> Option<LoanRecord> {
        self.state.lock().await.ledgers.loans.get(&key).cloned()
    }

    pub async fn loan_count(&self) -> usize {
        self.state.lock().await.ledgers.loans.len()
    }

    pub async fn add_author(&self, author: Author) {
        self.state.lock().await.catalog.authors.insert(author.id, author);
    }

    pub async fn add_publisher(&self, publisher: Publisher) {
        self.state
            .lock()
            .await
            .catalog
            .publishers
            .insert(publisher.id, publisher);
    }

    pub async fn add_book(&self, book: Book) {
        self.state.lock().await.catalog.books.insert(book.id, book);
    }

    pub async fn add_branch(&self, branch: Branch) {
        self.state.lock().await.catalog.branches.insert(branch.id, branch);
    }

    pub async fn add_borrower(&self, borrower: Borrower) {
        self.state
            .lock()
            .await
            .catalog
            .borrowers
            .insert(borrower.card_no, borrower);
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.ledgers.clone();
        Ok(Box::new(MemoryLedgerTransaction {
            guard: Some(guard),
            staged,
        }))
    }

    async fn list_loans(&self) -> AppResult<LoanStream<'_>> {
        let state = self.state.lock().await;
        let views: Vec<AppResult<LoanView>> = state
            .ledgers
            .loans
            .values()
            .filter_map(|loan| state.catalog.view(loan))
            .map(Ok)
            .collect();
        Ok(Box::pin(tokio_stream::iter(views)))
    }
}

pub struct MemoryLedgerTransaction {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    staged: Ledgers,
}

impl MemoryLedgerTransaction {
    fn staged(&mut self) -> AppResult<&mut Ledgers> {
        if self.guard.is_none() {
            return Err(AppError::Internal(
                "Ledger transaction already finished".to_string(),
            ));
        }
        Ok(&mut self.staged)
    }
}

#[async_trait]
impl LedgerTransaction for MemoryLedgerTransaction {
    async fn lock_copies(&mut self, book_id: i32, branch_id: i32) -> AppResult<Option<CopyRecord>> {
        Ok(self.staged()?.copies.get(&(book_id, branch_id)).copied())
    }

    async fn insert_copies(&mut self, copies: CopyRecord) -> AppResult<bool> {
        let key = (copies.book_id, copies.branch_id);
        let staged = self.staged()?;
        if staged.copies.contains_key(&key) {
            return Ok(false);
        }
        staged.copies.insert(key, copies);
        Ok(true)
    }

    async fn update_copies(&mut self, copies: CopyRecord) -> AppResult<bool> {
        match self.staged()?.copies.get_mut(&(copies.book_id, copies.branch_id)) {
            Some(row) => {
                *row = copies;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_loans(&mut self, key: LoanKey) -> AppResult<Vec<LoanRecord>> {
        Ok(self.staged()?.loans.get(&key).cloned().into_iter().collect())
    }

    async fn create_loan(&mut self, loan: LoanRecord) -> AppResult<()> {
        let key = loan.key();
        let staged = self.staged()?;
        if staged.loans.contains_key(&key) {
            return Err(AppError::DuplicateLoan {
                book_id: key.book_id,
                branch_id: key.branch_id,
                card_no: key.card_no,
            });
        }
        staged.loans.insert(key, loan);
        Ok(())
    }

    async fn update_loan(&mut self, loan: LoanRecord) -> AppResult<bool> {
        match self.staged()?.loans.get_mut(&loan.key()) {
            Some(row) => {
                *row = loan;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_loan(&mut self, key: LoanKey) -> AppResult<bool> {
        Ok(self.staged()?.loans.remove(&key).is_some())
    }

    async fn commit(&mut self) -> AppResult<()> {
        match self.guard.take() {
            Some(mut guard) => {
                guard.ledgers = std::mem::take(&mut self.staged);
                Ok(())
            }
            None => Err(AppError::Internal(
                "Ledger transaction already finished".to_string(),
            )),
        }
    }

    async fn rollback(&mut self) -> AppResult<()> {
        self.guard = None;
        self.staged = Ledgers::default();
        Ok(())
    }
}
