//! Role-specific views over the borrowing engine
//!
//! Patrons borrow and return, librarians look after inventory, administrators
//! override due dates. Each role gets its own [`LoanDesk`]; anything a role
//! does not override is refused.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::loans::{BorrowingEngine, LoanListing};
use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{CopyRecord, LoanKey, LoanRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patron,
    Librarian,
    Administrator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patron => "patron",
            Role::Librarian => "librarian",
            Role::Administrator => "administrator",
        }
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patron" | "borrower" => Ok(Role::Patron),
            "librarian" => Ok(Role::Librarian),
            "administrator" | "admin" => Ok(Role::Administrator),
            other => Err(AppError::Authentication(format!("Unknown role '{}'", other))),
        }
    }
}

fn denied(role: Role, action: &str) -> AppError {
    AppError::Authorization(format!("A {} may not {}", role.as_str(), action))
}

#[async_trait]
pub trait LoanDesk: Send + Sync {
    fn role(&self) -> Role;

    /// `due_date` of `None` lets the desk pick the loan period
    async fn checkout(&self, _key: LoanKey, _due_date: Option<NaiveDate>) -> AppResult<LoanRecord> {
        Err(denied(self.role(), "check out books"))
    }

    async fn return_loan(&self, _key: LoanKey) -> AppResult<CopyRecord> {
        Err(denied(self.role(), "return books"))
    }

    async fn renew(&self, _key: LoanKey, _new_due_date: NaiveDate) -> AppResult<LoanRecord> {
        Err(denied(self.role(), "change due dates"))
    }

    async fn lookup(&self, _key: LoanKey) -> AppResult<Option<LoanRecord>> {
        Err(denied(self.role(), "look up loans"))
    }

    fn list_all(&self) -> AppResult<LoanListing<'_>> {
        Err(denied(self.role(), "list loans"))
    }

    async fn set_copies(&self, _book_id: i32, _branch_id: i32, _no_of_copies: i32) -> AppResult<CopyRecord> {
        Err(denied(self.role(), "change branch inventory"))
    }
}

pub struct PatronDesk {
    engine: BorrowingEngine,
    loan_period_days: i64,
}

#[async_trait]
impl LoanDesk for PatronDesk {
    fn role(&self) -> Role {
        Role::Patron
    }

    async fn checkout(&self, key: LoanKey, due_date: Option<NaiveDate>) -> AppResult<LoanRecord> {
        if due_date.is_some() {
            return Err(denied(self.role(), "choose a due date"));
        }
        let now = self.engine.now();
        let due_date = u64::try_from(self.loan_period_days)
            .ok()
            .and_then(|days| now.date_naive().checked_add_days(Days::new(days)))
            .ok_or_else(|| {
                AppError::Internal(format!(
                    "Loan period of {} days is out of range",
                    self.loan_period_days
                ))
            })?;
        self.engine.checkout(key, now, due_date).await
    }

    async fn return_loan(&self, key: LoanKey) -> AppResult<CopyRecord> {
        self.engine.return_loan(key).await
    }

    async fn lookup(&self, key: LoanKey) -> AppResult<Option<LoanRecord>> {
        self.engine.lookup(key).await
    }
}

pub struct LibrarianDesk {
    engine: BorrowingEngine,
}

#[async_trait]
impl LoanDesk for LibrarianDesk {
    fn role(&self) -> Role {
        Role::Librarian
    }

    async fn lookup(&self, key: LoanKey) -> AppResult<Option<LoanRecord>> {
        self.engine.lookup(key).await
    }

    fn list_all(&self) -> AppResult<LoanListing<'_>> {
        Ok(self.engine.list_all())
    }

    async fn set_copies(&self, book_id: i32, branch_id: i32, no_of_copies: i32) -> AppResult<CopyRecord> {
        self.engine.set_copies(book_id, branch_id, no_of_copies).await
    }
}

pub struct AdministratorDesk {
    engine: BorrowingEngine,
}

#[async_trait]
impl LoanDesk for AdministratorDesk {
    fn role(&self) -> Role {
        Role::Administrator
    }

    async fn renew(&self, key: LoanKey, new_due_date: NaiveDate) -> AppResult<LoanRecord> {
        self.engine.renew(key, new_due_date).await
    }

    async fn lookup(&self, key: LoanKey) -> AppResult<Option<LoanRecord>> {
        self.engine.lookup(key).await
    }

    fn list_all(&self) -> AppResult<LoanListing<'_>> {
        Ok(self.engine.list_all())
    }
}

/// Pick the desk for a caller's role
pub fn desk_for(role: Role, engine: BorrowingEngine, loans: &LoansConfig) -> Box<dyn LoanDesk> {
    match role {
        Role::Patron => Box::new(PatronDesk {
            engine,
            loan_period_days: loans.loan_period_days,
        }),
        Role::Librarian => Box::new(LibrarianDesk { engine }),
        Role::Administrator => Box::new(AdministratorDesk { engine }),
    }
}
