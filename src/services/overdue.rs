//! Overdue scan: finds lapsed loans and notifies their borrowers

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use super::notifications::Notifier;
use crate::{error::AppResult, repository::Repository};

/// Notification that could not be delivered during a scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatchFailure {
    pub loan_id: i32,
    pub reason: String,
}

/// Outcome of one scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ScanReport {
    pub run_date: NaiveDate,
    /// Overdue loans found, each attempted once
    pub examined: usize,
    pub notified: usize,
    pub failures: Vec<DispatchFailure>,
}

/// Scans for overdue loans.
///
/// A scan only reads loans; its sole side effects are the notifications.
/// Running it again on the same day notifies the same loans again.
#[derive(Clone)]
pub struct OverdueScanner {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
    last_report: Arc<RwLock<Option<ScanReport>>>,
}

impl OverdueScanner {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            repository,
            notifier,
            last_report: Arc::new(RwLock::new(None)),
        }
    }

    /// Notify every loan unreturned past its due date as of `today`.
    ///
    /// A failed or panicking dispatch is recorded in the report and the
    /// scan moves on to the next loan.
    pub async fn scan(&self, today: NaiveDate) -> AppResult<ScanReport> {
        let overdue = self.repository.loans.list_overdue(today).await?;
        tracing::info!(%today, count = overdue.len(), "Scanning overdue loans");

        let mut report = ScanReport {
            run_date: today,
            examined: overdue.len(),
            notified: 0,
            failures: Vec::new(),
        };

        for details in overdue {
            let loan_id = details.loan.id;
            let days_overdue = (today - details.loan.due_date).num_days();
            let notifier = self.notifier.clone();

            let outcome =
                tokio::spawn(async move { notifier.notify_overdue(&details, days_overdue).await })
                    .await;

            let reason = match outcome {
                Ok(Ok(())) => {
                    report.notified += 1;
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("dispatch task failed: {}", e),
            };
            tracing::warn!(loan_id, days_overdue, %reason, "Overdue notification failed");
            report.failures.push(DispatchFailure { loan_id, reason });
        }

        tracing::info!(
            %today,
            examined = report.examined,
            notified = report.notified,
            failed = report.failures.len(),
            "Overdue scan finished"
        );

        *self.last_report.write().await = Some(report.clone());
        Ok(report)
    }

    /// Report of the most recent scan, if any ran since startup
    pub async fn last_report(&self) -> Option<ScanReport> {
        self.last_report.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{AppError, LendingError},
        models::{
            item::CreateItem,
            loan::{LoanDetails, NewLoan},
            member::CreateMember,
        },
        services::notifications::MockNotifier,
    };
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Loans opened on `loan_date` for 14 days, one per member
    async fn repository_with_loans(loan_dates: &[NaiveDate]) -> (Repository, Vec<i32>) {
        let repository = Repository::in_memory();
        let item = repository
            .items
            .create(&CreateItem {
                title: "Foo".to_string(),
                isbn: None,
                total_copies: 10,
            })
            .await
            .unwrap();

        let mut ids = Vec::new();
        for (n, loan_date) in loan_dates.iter().enumerate() {
            let member = repository
                .members
                .create(&CreateMember {
                    username: format!("member{}", n),
                    email: format!("member{}@example.com", n),
                })
                .await
                .unwrap();
            let loan = repository
                .loans
                .insert(&NewLoan::new(item.id, member.id, *loan_date, 14).unwrap())
                .await
                .unwrap();
            ids.push(loan.id);
        }
        (repository, ids)
    }

    #[tokio::test]
    async fn test_empty_scan() {
        let (repository, _) = repository_with_loans(&[]).await;
        let mut notifier = MockNotifier::new();
        notifier.expect_notify_overdue().never();

        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        let report = scanner.scan(date(2024, 3, 20)).await.unwrap();
        assert_eq!(report.examined, 0);
        assert_eq!(report.notified, 0);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_scan_reports_days_overdue_and_skips_current_loans() {
        // Due 2024-03-15 (5 days late) and 2024-03-25 (not due yet)
        let (repository, ids) =
            repository_with_loans(&[date(2024, 3, 1), date(2024, 3, 11)]).await;
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut notifier = MockNotifier::new();
        let log = seen.clone();
        notifier.expect_notify_overdue().returning(move |loan, days| {
            log.lock().unwrap().push((loan.loan.id, days));
            Ok(())
        });

        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        let report = scanner.scan(date(2024, 3, 20)).await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.notified, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(ids[0], 5)]);
    }

    #[tokio::test]
    async fn test_failing_dispatch_does_not_stop_the_scan() {
        let loan_dates = [date(2024, 3, 1), date(2024, 3, 2), date(2024, 3, 3)];
        let (repository, ids) = repository_with_loans(&loan_dates).await;
        let failing = ids[1];
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut notifier = MockNotifier::new();
        let log = seen.clone();
        notifier.expect_notify_overdue().returning(move |loan, _| {
            log.lock().unwrap().push(loan.loan.id);
            if loan.loan.id == failing {
                Err(LendingError::NotificationDelivery {
                    loan_id: failing,
                    reason: "mailbox unavailable".to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        });

        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        let report = scanner.scan(date(2024, 3, 30)).await.unwrap();

        assert_eq!(report.examined, 3);
        assert_eq!(report.notified, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].loan_id, failing);
        assert_eq!(*seen.lock().unwrap(), ids);
    }

    struct PanickingNotifier {
        panic_on: i32,
    }

    #[async_trait::async_trait]
    impl Notifier for PanickingNotifier {
        async fn notify_checkout(&self, _loan: &LoanDetails) -> AppResult<()> {
            Ok(())
        }

        async fn notify_overdue(&self, loan: &LoanDetails, _days_overdue: i64) -> AppResult<()> {
            if loan.loan.id == self.panic_on {
                panic!("template rendering blew up");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_dispatch_is_isolated() {
        let (repository, ids) =
            repository_with_loans(&[date(2024, 3, 1), date(2024, 3, 2)]).await;

        let notifier = PanickingNotifier { panic_on: ids[0] };
        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        let report = scanner.scan(date(2024, 3, 30)).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.notified, 1);
        assert_eq!(report.failures[0].loan_id, ids[0]);
    }

    #[tokio::test]
    async fn test_rescan_notifies_again() {
        let (repository, _) = repository_with_loans(&[date(2024, 3, 1)]).await;

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify_overdue()
            .times(2)
            .returning(|_, _| Ok(()));

        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        scanner.scan(date(2024, 3, 20)).await.unwrap();
        scanner.scan(date(2024, 3, 20)).await.unwrap();

        assert_eq!(
            scanner.last_report().await.map(|r| r.notified),
            Some(1)
        );
    }

    #[tokio::test]
    async fn test_returned_loans_are_not_scanned() {
        let (repository, ids) = repository_with_loans(&[date(2024, 3, 1)]).await;
        repository
            .loans
            .mark_returned(ids[0], date(2024, 3, 18))
            .await
            .unwrap();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify_overdue()
            .returning(|_, _| Err(AppError::Internal("should not be called".to_string())));

        let scanner = OverdueScanner::new(repository, Arc::new(notifier));
        let report = scanner.scan(date(2024, 3, 30)).await.unwrap();
        assert_eq!(report.examined, 0);
        assert!(report.failures.is_empty());
    }
}
