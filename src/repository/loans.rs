//! Loans repository

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::loan::{Loan, LoanDetails, NewLoan},
};

/// Loan storage.
///
/// Writes that depend on the current state of a loan are conditional
/// updates: they report `false` instead of overwriting a row that changed
/// under the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LoansRepository: Send + Sync {
    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan>;

    async fn get_by_id(&self, id: i32) -> AppResult<Loan>;

    async fn get_details(&self, id: i32) -> AppResult<LoanDetails>;

    /// Oldest unreturned loan of `item_id` held by `member_id`
    async fn find_active(&self, item_id: i32, member_id: i32) -> AppResult<Option<Loan>>;

    /// Persist a return; `false` if the loan was already returned
    async fn mark_returned(&self, id: i32, return_date: NaiveDate) -> AppResult<bool>;

    /// Move the due date of an active loan from `expected` to `due_date`;
    /// `false` if the loan was returned or its due date changed meanwhile
    async fn update_due_date(
        &self,
        id: i32,
        expected: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<bool>;

    /// Unreturned loans whose due date is strictly before `today`
    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>>;

    /// Unreturned loans of a member
    async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>>;

    async fn count_active_for_item(&self, item_id: i32) -> AppResult<i64>;

    async fn count_active(&self) -> AppResult<i64>;

    async fn count_overdue(&self, today: NaiveDate) -> AppResult<i64>;
}

const LOAN_COLUMNS: &str =
    "id, item_id, member_id, loan_date, due_date, return_date, is_returned";

const DETAILS_SELECT: &str = r#"
    SELECT l.id, l.item_id, l.member_id, l.loan_date, l.due_date, l.return_date, l.is_returned,
           i.title AS item_title, m.username AS member_username, m.email AS member_email
    FROM loans l
    JOIN items i ON i.id = l.item_id
    JOIN members m ON m.id = l.member_id
"#;

#[derive(Clone)]
pub struct PgLoansRepository {
    pool: Pool<Postgres>,
}

impl PgLoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoansRepository for PgLoansRepository {
    async fn insert(&self, loan: &NewLoan) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(&format!(
            r#"
            INSERT INTO loans (item_id, member_id, loan_date, due_date, is_returned)
            VALUES ($1, $2, $3, $4, FALSE)
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(loan.item_id)
        .bind(loan.member_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetails>(&format!("{DETAILS_SELECT} WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    async fn find_active(&self, item_id: i32, member_id: i32) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>(&format!(
            r#"
            SELECT {LOAN_COLUMNS} FROM loans
            WHERE item_id = $1 AND member_id = $2 AND NOT is_returned
            ORDER BY loan_date, id
            LIMIT 1
            "#
        ))
        .bind(item_id)
        .bind(member_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(loan)
    }

    async fn mark_returned(&self, id: i32, return_date: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE loans SET is_returned = TRUE, return_date = $2 WHERE id = $1 AND NOT is_returned",
        )
        .bind(id)
        .bind(return_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_due_date(
        &self,
        id: i32,
        expected: NaiveDate,
        due_date: NaiveDate,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE loans SET due_date = $3 WHERE id = $1 AND due_date = $2 AND NOT is_returned",
        )
        .bind(id)
        .bind(expected)
        .bind(due_date)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_overdue(&self, today: NaiveDate) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{DETAILS_SELECT} WHERE NOT l.is_returned AND l.due_date < $1 ORDER BY l.due_date, l.id"
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn list_for_member(&self, member_id: i32) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{DETAILS_SELECT} WHERE l.member_id = $1 AND NOT l.is_returned ORDER BY l.due_date, l.id"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    async fn count_active_for_item(&self, item_id: i32) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE item_id = $1 AND NOT is_returned")
                .bind(item_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE NOT is_returned")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_overdue(&self, today: NaiveDate) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE NOT is_returned AND due_date < $1",
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
