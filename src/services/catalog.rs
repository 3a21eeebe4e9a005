//! Catalog service (items)

use validator::Validate;

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Add an item with all its copies available
    pub async fn create_item(&self, item: &CreateItem) -> AppResult<Item> {
        item.validate()?;
        let created = self.repository.items.create(item).await?;
        tracing::info!(item_id = created.id, total_copies = created.total_copies, "Item created");
        Ok(created)
    }

    pub async fn get_item(&self, id: i32) -> AppResult<Item> {
        self.repository.items.get_by_id(id).await
    }

    pub async fn list_items(&self) -> AppResult<Vec<Item>> {
        self.repository.items.list().await
    }
}
