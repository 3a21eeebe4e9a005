//! Loan model and its lifecycle.
//!
//! A loan is `Active` until it is returned, after which it is `Returned`
//! for good. Being overdue is never stored: it is derived from the due date
//! and the day the question is asked, so it cannot go stale.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::error::LendingError;

/// Loan record as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub item_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub is_returned: bool,
}

/// Observable state of a loan on a given day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

/// A loan that has not been persisted yet.
///
/// Only built by checkout, once a copy of the item has been reserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoan {
    pub item_id: i32,
    pub member_id: i32,
    pub loan_date: NaiveDate,
    pub due_date: NaiveDate,
}

impl NewLoan {
    /// Open a loan on `loan_date`, due `loan_period_days` later
    pub fn new(
        item_id: i32,
        member_id: i32,
        loan_date: NaiveDate,
        loan_period_days: i64,
    ) -> Result<Self, LendingError> {
        let due_date = add_days(loan_date, loan_period_days)?;
        Ok(Self {
            item_id,
            member_id,
            loan_date,
            due_date,
        })
    }
}

fn add_days(date: NaiveDate, days: i64) -> Result<NaiveDate, LendingError> {
    if days <= 0 {
        return Err(LendingError::InvalidDuration { days });
    }
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
        .ok_or(LendingError::InvalidDuration { days })
}

impl Loan {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.is_returned && self.due_date < today
    }

    /// Whole days past the due date, `None` when the loan is not overdue
    pub fn days_overdue(&self, today: NaiveDate) -> Option<i64> {
        self.is_overdue(today)
            .then(|| (today - self.due_date).num_days())
    }

    pub fn status(&self, today: NaiveDate) -> LoanStatus {
        if self.is_returned {
            LoanStatus::Returned
        } else if self.is_overdue(today) {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }

    /// Push the due date back by `additional_days`.
    ///
    /// Only an active loan that is not overdue yet can be extended; nothing
    /// but the due date changes.
    pub fn extend(&self, additional_days: i64, today: NaiveDate) -> Result<Loan, LendingError> {
        if additional_days <= 0 {
            return Err(LendingError::InvalidDuration {
                days: additional_days,
            });
        }
        if self.is_returned {
            return Err(LendingError::AlreadyReturned { loan_id: self.id });
        }
        if self.due_date < today {
            return Err(LendingError::AlreadyOverdue {
                loan_id: self.id,
                due_date: self.due_date,
            });
        }

        Ok(Loan {
            due_date: add_days(self.due_date, additional_days)?,
            ..self.clone()
        })
    }

    /// Close the loan on `today`. A loan is returned at most once.
    pub fn mark_returned(&self, today: NaiveDate) -> Result<Loan, LendingError> {
        if self.is_returned {
            return Err(LendingError::AlreadyReturned { loan_id: self.id });
        }

        Ok(Loan {
            is_returned: true,
            return_date: Some(today),
            ..self.clone()
        })
    }
}

/// Loan joined with the member contact and the item title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub loan: Loan,
    pub item_title: String,
    pub member_username: String,
    pub member_email: String,
}

/// Loan with its status computed for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanView {
    #[serde(flatten)]
    pub details: LoanDetails,
    pub status: LoanStatus,
    pub days_overdue: i64,
}

impl LoanView {
    pub fn new(details: LoanDetails, today: NaiveDate) -> Self {
        Self {
            status: details.loan.status(today),
            days_overdue: details.loan.days_overdue(today).unwrap_or(0),
            details,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn active_loan(due_date: NaiveDate) -> Loan {
        Loan {
            id: 7,
            item_id: 1,
            member_id: 2,
            loan_date: date(2024, 3, 1),
            due_date,
            return_date: None,
            is_returned: false,
        }
    }

    #[test]
    fn test_new_loan_due_after_period() {
        let loan = NewLoan::new(1, 2, date(2024, 3, 1), 14).unwrap();
        assert_eq!(loan.due_date, date(2024, 3, 15));
    }

    #[test]
    fn test_new_loan_rejects_empty_period() {
        assert_eq!(
            NewLoan::new(1, 2, date(2024, 3, 1), 0),
            Err(LendingError::InvalidDuration { days: 0 })
        );
    }

    #[test]
    fn test_overdue_is_derived() {
        let loan = active_loan(date(2024, 3, 15));
        assert!(!loan.is_overdue(date(2024, 3, 15)));
        assert_eq!(loan.status(date(2024, 3, 15)), LoanStatus::Active);
        assert!(loan.is_overdue(date(2024, 3, 20)));
        assert_eq!(loan.days_overdue(date(2024, 3, 20)), Some(5));
        assert_eq!(loan.status(date(2024, 3, 20)), LoanStatus::Overdue);
    }

    #[test]
    fn test_returned_loan_is_never_overdue() {
        let loan = active_loan(date(2024, 3, 15))
            .mark_returned(date(2024, 3, 30))
            .unwrap();
        assert!(!loan.is_overdue(date(2024, 4, 30)));
        assert_eq!(loan.days_overdue(date(2024, 4, 30)), None);
        assert_eq!(loan.status(date(2024, 4, 30)), LoanStatus::Returned);
    }

    #[test]
    fn test_extend_moves_only_due_date() {
        let loan = active_loan(date(2024, 3, 15));
        let extended = loan.extend(7, date(2024, 3, 10)).unwrap();
        assert_eq!(extended.due_date, date(2024, 3, 22));
        assert_eq!(extended.loan_date, loan.loan_date);
        assert_eq!(extended.return_date, None);
        assert!(!extended.is_returned);
    }

    #[test]
    fn test_extend_on_due_date_is_allowed() {
        let loan = active_loan(date(2024, 3, 15));
        assert!(loan.extend(1, date(2024, 3, 15)).is_ok());
    }

    #[test]
    fn test_extend_rejects_overdue_loan() {
        let loan = active_loan(date(2024, 3, 15));
        assert_eq!(
            loan.extend(7, date(2024, 3, 16)),
            Err(LendingError::AlreadyOverdue {
                loan_id: 7,
                due_date: date(2024, 3, 15)
            })
        );
    }

    #[test]
    fn test_extend_rejects_returned_loan() {
        let loan = active_loan(date(2024, 3, 15))
            .mark_returned(date(2024, 3, 10))
            .unwrap();
        assert_eq!(
            loan.extend(7, date(2024, 3, 11)),
            Err(LendingError::AlreadyReturned { loan_id: 7 })
        );
    }

    #[test]
    fn test_extend_returned_loan_past_due_date() {
        // A returned loan is never overdue, whatever its due date
        let loan = active_loan(date(2024, 3, 15))
            .mark_returned(date(2024, 3, 20))
            .unwrap();
        assert_eq!(
            loan.extend(7, date(2024, 3, 25)),
            Err(LendingError::AlreadyReturned { loan_id: 7 })
        );
    }

    #[test]
    fn test_extend_rejects_non_positive_days() {
        let loan = active_loan(date(2024, 3, 15));
        assert_eq!(
            loan.extend(-1, date(2024, 3, 10)),
            Err(LendingError::InvalidDuration { days: -1 })
        );
        assert_eq!(
            loan.extend(0, date(2024, 3, 10)),
            Err(LendingError::InvalidDuration { days: 0 })
        );
    }

    #[test]
    fn test_return_happens_once() {
        let loan = active_loan(date(2024, 3, 15));
        let returned = loan.mark_returned(date(2024, 3, 12)).unwrap();
        assert!(returned.is_returned);
        assert_eq!(returned.return_date, Some(date(2024, 3, 12)));
        assert_eq!(
            returned.mark_returned(date(2024, 3, 13)),
            Err(LendingError::AlreadyReturned { loan_id: 7 })
        );
    }
}
