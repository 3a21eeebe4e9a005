//! Item (lendable catalog entry) model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Item with its shared pool of copies.
///
/// `available_copies` stays within `0..=total_copies` and is only changed
/// through the inventory ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Item {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
}

/// Create item request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateItem {
    #[validate(length(min = 1, message = "Title must not be empty"))]
    pub title: String,
    pub isbn: Option<String>,
    /// Number of copies owned; all of them start available
    #[validate(range(min = 1, message = "An item needs at least one copy"))]
    pub total_copies: i32,
}
