//! Loan ledger model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{book::BookSummary, borrower::Borrower, branch::Branch};

/// Composite key of a loan: one borrower holding one book from one branch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema, IntoParams, Validate,
)]
#[into_params(parameter_in = Query)]
pub struct LoanKey {
    #[validate(range(min = 1))]
    pub book_id: i32,
    #[validate(range(min = 1))]
    pub branch_id: i32,
    #[validate(range(min = 1))]
    pub card_no: i32,
}

impl LoanKey {
    pub fn new(book_id: i32, branch_id: i32, card_no: i32) -> Self {
        Self {
            book_id,
            branch_id,
            card_no,
        }
    }
}

impl From<(&super::Book, &Branch, &Borrower)> for LoanKey {
    fn from((book, branch, borrower): (&super::Book, &Branch, &Borrower)) -> Self {
        Self::new(book.id, branch.id, borrower.card_no)
    }
}

/// Active loan row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanRecord {
    pub book_id: i32,
    pub branch_id: i32,
    pub card_no: i32,
    pub date_out: DateTime<Utc>,
    pub due_date: NaiveDate,
}

impl LoanRecord {
    pub fn new(key: LoanKey, date_out: DateTime<Utc>, due_date: NaiveDate) -> Self {
        Self {
            book_id: key.book_id,
            branch_id: key.branch_id,
            card_no: key.card_no,
            date_out,
            due_date,
        }
    }

    pub fn key(&self) -> LoanKey {
        LoanKey::new(self.book_id, self.branch_id, self.card_no)
    }
}

/// Loan joined with the identity of what was lent, where, and to whom
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoanView {
    pub book: BookSummary,
    pub branch: Branch,
    pub borrower: Borrower,
    pub date_out: DateTime<Utc>,
    pub due_date: NaiveDate,
}

impl LoanView {
    pub fn key(&self) -> LoanKey {
        LoanKey::new(self.book.id, self.branch.id, self.borrower.card_no)
    }
}

/// Flat row shape of the joined loan listing query
#[derive(Debug, FromRow)]
pub struct LoanViewRow {
    pub book_id: i32,
    pub title: String,
    pub author_name: Option<String>,
    pub publisher_name: Option<String>,
    pub branch_id: i32,
    pub branch_name: String,
    pub branch_address: Option<String>,
    pub card_no: i32,
    pub borrower_name: String,
    pub borrower_address: Option<String>,
    pub borrower_phone: Option<String>,
    pub date_out: DateTime<Utc>,
    pub due_date: NaiveDate,
}

impl From<LoanViewRow> for LoanView {
    fn from(row: LoanViewRow) -> Self {
        Self {
            book: BookSummary {
                id: row.book_id,
                title: row.title,
                author: row.author_name,
                publisher: row.publisher_name,
            },
            branch: Branch {
                id: row.branch_id,
                name: row.branch_name,
                address: row.branch_address,
            },
            borrower: Borrower {
                card_no: row.card_no,
                name: row.borrower_name,
                address: row.borrower_address,
                phone: row.borrower_phone,
            },
            date_out: row.date_out,
            due_date: row.due_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;
    use validator::Validate;

    #[test]
    fn test_key_from_records() {
        let book = Book { id: 7, title: "Kindred".into(), author_id: None, publisher_id: None };
        let branch = Branch { id: 3, name: "North".into(), address: None };
        let borrower = Borrower { card_no: 42, name: "Jo".into(), address: None, phone: None };

        assert_eq!(LoanKey::from((&book, &branch, &borrower)), LoanKey::new(7, 3, 42));
    }

    #[test]
    fn test_key_validation() {
        assert!(LoanKey::new(7, 3, 42).validate().is_ok());
        assert!(LoanKey::new(7, 0, 42).validate().is_err());
    }
}
