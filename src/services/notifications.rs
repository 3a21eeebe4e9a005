//! Notification dispatcher: one message per loan event

use std::sync::Arc;

use async_trait::async_trait;

use super::email::Mailer;
use crate::{
    error::{AppResult, LendingError},
    models::loan::LoanDetails,
};

/// Delivers loan notifications to members.
///
/// Implementations do not retry; a failed delivery is reported to the
/// caller, which decides whether to retry (task queue) or record it
/// (overdue scan).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_checkout(&self, loan: &LoanDetails) -> AppResult<()>;

    async fn notify_overdue(&self, loan: &LoanDetails, days_overdue: i64) -> AppResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn checkout(loan: &LoanDetails) -> Self {
        Self {
            recipient: loan.member_email.clone(),
            subject: "Book Loaned Successfully".to_string(),
            body: format!(
                "Hello {username},\n\nYou have successfully loaned \"{title}\".\nPlease return it by the due date ({due_date}).",
                username = loan.member_username,
                title = loan.item_title,
                due_date = loan.loan.due_date,
            ),
        }
    }

    pub fn overdue(loan: &LoanDetails, days_overdue: i64) -> Self {
        Self {
            recipient: loan.member_email.clone(),
            subject: "Overdue Book Reminder".to_string(),
            body: format!(
                "Hello {username},\n\nYour book \"{title}\" is {days_overdue} days overdue.\nPlease return it as soon as possible.\n\nDue date was: {due_date}\nThank you.",
                username = loan.member_username,
                title = loan.item_title,
                due_date = loan.loan.due_date,
            ),
        }
    }
}

/// Notifier delivering through a [`Mailer`]
#[derive(Clone)]
pub struct EmailNotifier {
    mailer: Arc<dyn Mailer>,
}

impl EmailNotifier {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    async fn deliver(&self, loan_id: i32, kind: &str, notification: Notification) -> AppResult<()> {
        match self
            .mailer
            .send(
                &notification.recipient,
                &notification.subject,
                &notification.body,
            )
            .await
        {
            Ok(()) => {
                tracing::info!(loan_id, kind, "Notification sent");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(loan_id, kind, error = %e, "Notification delivery failed");
                Err(LendingError::NotificationDelivery {
                    loan_id,
                    reason: e.to_string(),
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify_checkout(&self, loan: &LoanDetails) -> AppResult<()> {
        self.deliver(loan.loan.id, "checkout", Notification::checkout(loan))
            .await
    }

    async fn notify_overdue(&self, loan: &LoanDetails, days_overdue: i64) -> AppResult<()> {
        self.deliver(
            loan.loan.id,
            "overdue",
            Notification::overdue(loan, days_overdue),
        )
        .await
    }
}
