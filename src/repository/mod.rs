//! Repository layer for items, members and loans.
//!
//! Each store is an async trait so services can run against PostgreSQL in
//! production and against [`memory::MemoryStore`] in tests or demos.

pub mod items;
pub mod loans;
pub mod members;
pub mod memory;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

pub use items::ItemsRepository;
pub use loans::LoansRepository;
pub use members::MembersRepository;

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub items: Arc<dyn ItemsRepository>,
    pub members: Arc<dyn MembersRepository>,
    pub loans: Arc<dyn LoansRepository>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            items: Arc::new(items::PgItemsRepository::new(pool.clone())),
            members: Arc::new(members::PgMembersRepository::new(pool.clone())),
            loans: Arc::new(loans::PgLoansRepository::new(pool)),
        }
    }

    /// Create a repository keeping everything in process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            items: store.clone(),
            members: store.clone(),
            loans: store,
        }
    }
}
