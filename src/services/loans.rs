//! Loan service: checkout, return and extension as single business operations

use std::sync::Arc;

use serde::Serialize;
use utoipa::ToSchema;

use super::{
    clock::Clock,
    inventory::InventoryLedger,
    tasks::{Job, TaskQueue},
};
use crate::{
    config::LoansConfig,
    error::{AppError, AppResult, LendingError},
    models::loan::{Loan, LoanView, NewLoan},
    repository::Repository,
};

/// Attempts at extending a loan whose due date keeps changing underneath
const EXTEND_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanStats {
    pub active: i64,
    pub overdue: i64,
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    inventory: InventoryLedger,
    tasks: TaskQueue,
    clock: Arc<dyn Clock>,
    loan_period_days: i64,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        inventory: InventoryLedger,
        tasks: TaskQueue,
        clock: Arc<dyn Clock>,
        config: &LoansConfig,
    ) -> Self {
        Self {
            repository,
            inventory,
            tasks,
            clock,
            loan_period_days: config.loan_period_days,
        }
    }

    /// Lend one copy of `item_id` to `member_id`.
    ///
    /// The copy is reserved first; if the loan cannot be recorded the
    /// reservation is cancelled before the error is returned. The checkout
    /// notification is queued and never delays or undoes the checkout.
    pub async fn checkout(&self, item_id: i32, member_id: i32) -> AppResult<Loan> {
        let reservation = self.inventory.reserve(item_id).await?;
        let remaining = reservation.remaining;

        let loan = match self.open_loan(item_id, member_id).await {
            Ok(loan) => loan,
            Err(e) => {
                if let Err(release_err) = self.inventory.cancel(reservation).await {
                    tracing::error!(
                        item_id,
                        member_id,
                        error = %release_err,
                        "Could not cancel reservation after failed checkout"
                    );
                }
                return Err(e);
            }
        };
        self.inventory.confirm(reservation);

        tracing::info!(
            loan_id = loan.id,
            item_id,
            member_id,
            due_date = %loan.due_date,
            remaining,
            "Item checked out"
        );
        self.tasks
            .enqueue(Job::CheckoutNotification { loan_id: loan.id });

        Ok(loan)
    }

    async fn open_loan(&self, item_id: i32, member_id: i32) -> AppResult<Loan> {
        self.repository.members.get_by_id(member_id).await?;
        let new_loan = NewLoan::new(item_id, member_id, self.clock.today(), self.loan_period_days)?;
        self.repository.loans.insert(&new_loan).await
    }

    /// Close the active loan of `item_id` held by `member_id` and put the
    /// copy back.
    ///
    /// If the copy cannot be put back once the loan is closed, the error is
    /// returned as is: the loan stays returned and the item needs
    /// reconciliation.
    pub async fn return_item(&self, item_id: i32, member_id: i32) -> AppResult<Loan> {
        let today = self.clock.today();
        let hold = self.inventory.hold(item_id).await;
        let loan = self
            .repository
            .loans
            .find_active(item_id, member_id)
            .await?
            .ok_or(LendingError::NoActiveLoan { item_id, member_id })?;

        let returned = loan.mark_returned(today)?;
        if !self.repository.loans.mark_returned(loan.id, today).await? {
            // A concurrent return closed it first
            return Err(LendingError::AlreadyReturned { loan_id: loan.id }.into());
        }

        if let Err(e) = self.inventory.release(&hold).await {
            tracing::error!(
                loan_id = loan.id,
                item_id,
                error = %e,
                "Loan returned but its copy was not released, item needs reconciliation"
            );
            return Err(e);
        }

        tracing::info!(loan_id = loan.id, item_id, member_id, "Item returned");
        Ok(returned)
    }

    /// Push the due date of a loan back by `additional_days`
    pub async fn extend(&self, loan_id: i32, additional_days: i64) -> AppResult<Loan> {
        let today = self.clock.today();

        for _ in 0..EXTEND_ATTEMPTS {
            let loan = self.repository.loans.get_by_id(loan_id).await?;
            let extended = loan.extend(additional_days, today)?;

            if self
                .repository
                .loans
                .update_due_date(loan_id, loan.due_date, extended.due_date)
                .await?
            {
                tracing::info!(
                    loan_id,
                    additional_days,
                    due_date = %extended.due_date,
                    "Loan extended"
                );
                return Ok(extended);
            }
            tracing::debug!(loan_id, "Loan changed while extending, retrying");
        }

        tracing::warn!(loan_id, attempts = EXTEND_ATTEMPTS, "Giving up extending a contended loan");
        Err(AppError::Conflict(format!(
            "Loan {} kept changing while extending",
            loan_id
        )))
    }

    pub async fn get_loan(&self, loan_id: i32) -> AppResult<LoanView> {
        let details = self.repository.loans.get_details(loan_id).await?;
        Ok(LoanView::new(details, self.clock.today()))
    }

    /// Active loans of a member, with their current status
    pub async fn member_loans(&self, member_id: i32) -> AppResult<Vec<LoanView>> {
        self.repository.members.get_by_id(member_id).await?;
        let today = self.clock.today();
        let loans = self.repository.loans.list_for_member(member_id).await?;
        Ok(loans
            .into_iter()
            .map(|details| LoanView::new(details, today))
            .collect())
    }

    pub async fn stats(&self) -> AppResult<LoanStats> {
        Ok(LoanStats {
            active: self.repository.loans.count_active().await?,
            overdue: self
                .repository
                .loans
                .count_overdue(self.clock.today())
                .await?,
        })
    }
}
