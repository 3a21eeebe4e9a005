//! Inventory ledger: the only writer of `available_copies`

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::{OwnedRwLockReadGuard, RwLock};
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult, LendingError},
    repository::Repository,
};

/// Shared access to one item's stock while a copy moves between the shelf
/// and a loan.
///
/// Reconciliation of the item waits until every hold is dropped.
#[must_use]
#[derive(Debug)]
pub struct ItemHold {
    item_id: i32,
    _guard: OwnedRwLockReadGuard<()>,
}

impl ItemHold {
    pub fn item_id(&self) -> i32 {
        self.item_id
    }
}

/// One copy of an item taken off the shelf.
///
/// Checkout either turns it into a loan and [`InventoryLedger::confirm`]s
/// it, or hands it back with [`InventoryLedger::cancel`].
#[must_use = "a reservation must become a loan or be cancelled"]
#[derive(Debug)]
pub struct Reservation {
    pub item_id: i32,
    /// Copies still available right after this reservation
    pub remaining: i32,
    hold: ItemHold,
}

/// Outcome of re-deriving an item's availability from its active loans
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Reconciliation {
    pub item_id: i32,
    pub total_copies: i32,
    pub active_loans: i64,
    pub previous_available: i32,
    pub available_copies: i32,
}

impl Reconciliation {
    pub fn drifted(&self) -> bool {
        self.previous_available != self.available_copies
    }
}

#[derive(Clone)]
pub struct InventoryLedger {
    repository: Repository,
    gates: Arc<Mutex<HashMap<i32, Arc<RwLock<()>>>>>,
}

impl InventoryLedger {
    pub fn new(repository: Repository) -> Self {
        Self {
            repository,
            gates: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn gate(&self, item_id: i32) -> Arc<RwLock<()>> {
        self.gates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(item_id)
            .or_default()
            .clone()
    }

    /// Hold `item_id` for a stock movement. Many holds run side by side;
    /// only reconciliation is kept out.
    pub async fn hold(&self, item_id: i32) -> ItemHold {
        ItemHold {
            item_id,
            _guard: self.gate(item_id).read_owned().await,
        }
    }

    /// Take one copy of `item_id`, failing without side effects when none
    /// is available
    pub async fn reserve(&self, item_id: i32) -> AppResult<Reservation> {
        let hold = self.hold(item_id).await;
        match self.repository.items.take_copy(item_id).await? {
            Some(remaining) => {
                tracing::debug!(item_id, remaining, "Reserved one copy");
                Ok(Reservation {
                    item_id,
                    remaining,
                    hold,
                })
            }
            None => Err(LendingError::NoCopiesAvailable { item_id }.into()),
        }
    }

    /// The reservation is now backed by a recorded loan
    pub fn confirm(&self, reservation: Reservation) {
        tracing::debug!(item_id = reservation.item_id, "Reservation confirmed");
    }

    /// Put one copy of the held item back on the shelf.
    ///
    /// A release that would exceed the item's capacity changes nothing and
    /// is reported as a consistency violation.
    pub async fn release(&self, hold: &ItemHold) -> AppResult<()> {
        let item_id = hold.item_id;
        if let Some(available) = self.repository.items.put_back_copy(item_id).await? {
            tracing::debug!(item_id, available, "Released one copy");
            return Ok(());
        }

        let item = self.repository.items.get_by_id(item_id).await?;
        tracing::error!(
            item_id,
            total_copies = item.total_copies,
            "Consistency violation: release would exceed item capacity"
        );
        Err(LendingError::ConsistencyViolation {
            item_id,
            total_copies: item.total_copies,
        }
        .into())
    }

    /// Hand back a reservation that did not become a loan
    pub async fn cancel(&self, reservation: Reservation) -> AppResult<()> {
        self.release(&reservation.hold).await
    }

    /// Recompute `available_copies` as `total_copies - active loans`.
    ///
    /// Loans are the source of truth. Waits for the reservations and
    /// returns of this item already in progress, and holds new ones back
    /// until done. The correction is written only if the count is still
    /// the one it was derived from; otherwise nothing changes and a
    /// conflict is returned.
    pub async fn reconcile(&self, item_id: i32) -> AppResult<Reconciliation> {
        let gate = self.gate(item_id);
        let _exclusive = gate.write().await;

        let item = self.repository.items.get_by_id(item_id).await?;
        let active_loans = self.repository.loans.count_active_for_item(item_id).await?;

        let expected = i64::from(item.total_copies) - active_loans;
        if expected < 0 {
            tracing::error!(
                item_id,
                total_copies = item.total_copies,
                active_loans,
                "Consistency violation: more active loans than copies"
            );
            return Err(LendingError::ConsistencyViolation {
                item_id,
                total_copies: item.total_copies,
            }
            .into());
        }
        let available_copies = i32::try_from(expected)
            .map_err(|_| AppError::Internal(format!("Invalid copy count for item {}", item_id)))?;

        let report = Reconciliation {
            item_id,
            total_copies: item.total_copies,
            active_loans,
            previous_available: item.available_copies,
            available_copies,
        };

        if report.drifted() {
            let written = self
                .repository
                .items
                .set_available(item_id, report.previous_available, available_copies)
                .await?;
            if !written {
                tracing::warn!(item_id, "Available copies changed while reconciling");
                return Err(AppError::Conflict(format!(
                    "Availability of item {} changed while reconciling",
                    item_id
                )));
            }
            tracing::warn!(
                item_id,
                previous = report.previous_available,
                available_copies,
                "Corrected available copies"
            );
        }

        Ok(report)
    }
}
