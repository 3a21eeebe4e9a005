//! Items repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::item::{CreateItem, Item},
};

/// Item storage with atomic copy accounting.
///
/// `take_copy` and `put_back_copy` check and change `available_copies` in
/// one indivisible step: concurrent callers never observe the check apart
/// from the write.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemsRepository: Send + Sync {
    async fn create(&self, item: &CreateItem) -> AppResult<Item>;

    async fn get_by_id(&self, id: i32) -> AppResult<Item>;

    async fn list(&self) -> AppResult<Vec<Item>>;

    /// Decrement `available_copies` if at least one copy is available.
    ///
    /// Returns the remaining count, or `None` (and changes nothing) when
    /// the item is out of stock.
    async fn take_copy(&self, id: i32) -> AppResult<Option<i32>>;

    /// Increment `available_copies` unless it already equals `total_copies`.
    ///
    /// Returns the new count, or `None` (and changes nothing) at capacity.
    async fn put_back_copy(&self, id: i32) -> AppResult<Option<i32>>;

    /// Replace `available_copies` with `available_copies` if it still
    /// equals `previous`, used by reconciliation.
    ///
    /// Returns false (and changes nothing) when the count moved since it
    /// was read.
    async fn set_available(
        &self,
        id: i32,
        previous: i32,
        available_copies: i32,
    ) -> AppResult<bool>;
}

#[derive(Clone)]
pub struct PgItemsRepository {
    pool: Pool<Postgres>,
}

impl PgItemsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: i32) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Item with id {} not found", id)))
        }
    }
}

#[async_trait]
impl ItemsRepository for PgItemsRepository {
    async fn create(&self, item: &CreateItem) -> AppResult<Item> {
        let created = sqlx::query_as::<_, Item>(
            r#"
            INSERT INTO items (title, isbn, total_copies, available_copies)
            VALUES ($1, $2, $3, $3)
            RETURNING id, title, isbn, total_copies, available_copies
            "#,
        )
        .bind(&item.title)
        .bind(&item.isbn)
        .bind(item.total_copies)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Item> {
        sqlx::query_as::<_, Item>(
            "SELECT id, title, isbn, total_copies, available_copies FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Item with id {} not found", id)))
    }

    async fn list(&self) -> AppResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT id, title, isbn, total_copies, available_copies FROM items ORDER BY title, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn take_copy(&self, id: i32) -> AppResult<Option<i32>> {
        // The row lock taken by UPDATE serializes concurrent takers
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE items SET available_copies = available_copies - 1
            WHERE id = $1 AND available_copies > 0
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if remaining.is_none() {
            self.ensure_exists(id).await?;
        }
        Ok(remaining)
    }

    async fn put_back_copy(&self, id: i32) -> AppResult<Option<i32>> {
        let available: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE items SET available_copies = available_copies + 1
            WHERE id = $1 AND available_copies < total_copies
            RETURNING available_copies
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        if available.is_none() {
            self.ensure_exists(id).await?;
        }
        Ok(available)
    }

    async fn set_available(
        &self,
        id: i32,
        previous: i32,
        available_copies: i32,
    ) -> AppResult<bool> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE items SET available_copies = $3
            WHERE id = $1 AND available_copies = $2
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(previous)
        .bind(available_copies)
        .fetch_optional(&self.pool)
        .await?;

        if updated.is_none() {
            self.ensure_exists(id).await?;
        }
        Ok(updated.is_some())
    }
}
