//! Business logic services

pub mod catalog;
pub mod clock;
pub mod email;
pub mod inventory;
pub mod loans;
pub mod members;
pub mod notifications;
pub mod overdue;
pub mod scheduler;
pub mod tasks;

use std::sync::Arc;

use crate::{config::LoansConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub inventory: inventory::InventoryLedger,
    pub loans: loans::LoansService,
    pub overdue: overdue::OverdueScanner,
    pub clock: Arc<dyn clock::Clock>,
}

impl Services {
    /// Create all services with the given repository.
    ///
    /// Notifications go through `notifier`, directly for overdue scans and
    /// through `tasks` for checkouts.
    pub fn new(
        repository: Repository,
        notifier: Arc<dyn notifications::Notifier>,
        tasks: tasks::TaskQueue,
        clock: Arc<dyn clock::Clock>,
        loans_config: &LoansConfig,
    ) -> Self {
        let inventory = inventory::InventoryLedger::new(repository.clone());
        Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(
                repository.clone(),
                inventory.clone(),
                tasks,
                clock.clone(),
                loans_config,
            ),
            overdue: overdue::OverdueScanner::new(repository, notifier),
            inventory,
            clock,
        }
    }
}
