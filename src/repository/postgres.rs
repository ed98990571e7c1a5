//! PostgreSQL ledger store

use async_trait::async_trait;
use sqlx::{postgres::PgConnection, Pool, Postgres, Transaction};
use tokio_stream::StreamExt;

use super::{LedgerStore, LedgerTransaction, LoanStream};
use crate::{
    error::{AppError, AppResult},
    models::{loan::LoanViewRow, CopyRecord, LoanKey, LoanRecord, LoanView},
};

const LIST_LOANS_SQL: &str = r#"
    SELECT l.book_id, b.title, a.name AS author_name, p.name AS publisher_name,
           l.branch_id, br.name AS branch_name, br.address AS branch_address,
           l.card_no, bo.name AS borrower_name, bo.address AS borrower_address,
           bo.phone AS borrower_phone,
           l.date_out, l.due_date
    FROM book_loans l
    JOIN books b ON b.id = l.book_id
    LEFT JOIN authors a ON a.id = b.author_id
    LEFT JOIN publishers p ON p.id = b.publisher_id
    JOIN branches br ON br.id = l.branch_id
    JOIN borrowers bo ON bo.card_no = l.card_no
"#;

#[derive(Clone)]
pub struct PgLedgerStore {
    pool: Pool<Postgres>,
}

impl PgLedgerStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgLedgerTransaction { tx: Some(tx) }))
    }

    async fn list_loans(&self) -> AppResult<LoanStream<'_>> {
        let rows = sqlx::query_as::<_, LoanViewRow>(LIST_LOANS_SQL)
            .fetch(&self.pool)
            .map(|row| row.map(LoanView::from).map_err(AppError::from));
        Ok(Box::pin(rows))
    }
}

/// Transaction over a pooled connection; dropped without commit it rolls back
pub struct PgLedgerTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgLedgerTransaction {
    fn conn(&mut self) -> AppResult<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal("Ledger transaction already finished".to_string()))
    }
}

#[async_trait]
impl LedgerTransaction for PgLedgerTransaction {
    async fn lock_copies(&mut self, book_id: i32, branch_id: i32) -> AppResult<Option<CopyRecord>> {
        let copies = sqlx::query_as::<_, CopyRecord>(
            r#"
            SELECT book_id, branch_id, no_of_copies, no_of_available_copies
            FROM book_copies
            WHERE book_id = $1 AND branch_id = $2
            FOR UPDATE
            "#,
        )
        .bind(book_id)
        .bind(branch_id)
        .fetch_optional(self.conn()?)
        .await?;
        Ok(copies)
    }

    async fn insert_copies(&mut self, copies: CopyRecord) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO book_copies (book_id, branch_id, no_of_copies, no_of_available_copies)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (book_id, branch_id) DO NOTHING
            "#,
        )
        .bind(copies.book_id)
        .bind(copies.branch_id)
        .bind(copies.no_of_copies)
        .bind(copies.no_of_available_copies)
        .execute(self.conn()?)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(AppError::CatalogRecordNotFound {
                    book_id: copies.book_id,
                    branch_id: copies.branch_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_copies(&mut self, copies: CopyRecord) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE book_copies
            SET no_of_copies = $1, no_of_available_copies = $2
            WHERE book_id = $3 AND branch_id = $4
            "#,
        )
        .bind(copies.no_of_copies)
        .bind(copies.no_of_available_copies)
        .bind(copies.book_id)
        .bind(copies.branch_id)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_loans(&mut self, key: LoanKey) -> AppResult<Vec<LoanRecord>> {
        let loans = sqlx::query_as::<_, LoanRecord>(
            r#"
            SELECT book_id, branch_id, card_no, date_out, due_date
            FROM book_loans
            WHERE book_id = $1 AND branch_id = $2 AND card_no = $3
            "#,
        )
        .bind(key.book_id)
        .bind(key.branch_id)
        .bind(key.card_no)
        .fetch_all(self.conn()?)
        .await?;
        Ok(loans)
    }

    async fn create_loan(&mut self, loan: LoanRecord) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO book_loans (book_id, branch_id, card_no, date_out, due_date)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(loan.book_id)
        .bind(loan.branch_id)
        .bind(loan.card_no)
        .bind(loan.date_out)
        .bind(loan.due_date)
        .execute(self.conn()?)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::DuplicateLoan {
                book_id: loan.book_id,
                branch_id: loan.branch_id,
                card_no: loan.card_no,
            }),
            // book_copies is locked by the caller, so only the borrower can be missing
            Err(sqlx::Error::Database(e)) if e.is_foreign_key_violation() => {
                Err(AppError::BorrowerNotFound { card_no: loan.card_no })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_loan(&mut self, loan: LoanRecord) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE book_loans
            SET date_out = $1, due_date = $2
            WHERE book_id = $3 AND branch_id = $4 AND card_no = $5
            "#,
        )
        .bind(loan.date_out)
        .bind(loan.due_date)
        .bind(loan.book_id)
        .bind(loan.branch_id)
        .bind(loan.card_no)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_loan(&mut self, key: LoanKey) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM book_loans WHERE book_id = $1 AND branch_id = $2 AND card_no = $3",
        )
        .bind(key.book_id)
        .bind(key.branch_id)
        .bind(key.card_no)
        .execute(self.conn()?)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(&mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.commit().await?),
            None => Err(AppError::Internal("Ledger transaction already finished".to_string())),
        }
    }

    async fn rollback(&mut self) -> AppResult<()> {
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}
