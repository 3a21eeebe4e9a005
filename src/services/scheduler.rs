//! Daily trigger for the overdue scan

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, NaiveTime, Utc};
use tokio::{sync::Notify, task::JoinHandle};

use super::{clock::Clock, overdue::OverdueScanner};
use crate::{
    config::SchedulerConfig,
    error::{AppError, AppResult},
};

/// First moment strictly after `now` whose UTC wall-clock time is `at`
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + chrono::Duration::days(1)
    }
}

/// Runs the overdue scan once a day at a fixed UTC time.
///
/// Only one scan runs at a time from this scheduler; a scan that outlasts
/// the next slot delays it.
pub struct OverdueScheduler {
    scanner: OverdueScanner,
    clock: Arc<dyn Clock>,
    at: NaiveTime,
    shutdown: Arc<Notify>,
}

impl OverdueScheduler {
    pub fn new(
        scanner: OverdueScanner,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> AppResult<Self> {
        let at = NaiveTime::from_hms_opt(config.hour, config.minute, 0).ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid scan time {:02}:{:02}",
                config.hour, config.minute
            ))
        })?;

        Ok(Self {
            scanner,
            clock,
            at,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Handle that stops the scheduler when notified
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(at = %self.at, "Overdue scheduler started (UTC)");

            loop {
                let now = Utc::now();
                let next = next_run_after(now, self.at);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                tracing::debug!(%next, "Next overdue scan scheduled");

                tokio::select! {
                    _ = self.shutdown.notified() => {
                        tracing::info!("Overdue scheduler received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(wait) => {
                        let today = self.clock.today();
                        match self.scanner.scan(today).await {
                            Ok(report) => tracing::info!(
                                %today,
                                examined = report.examined,
                                failed = report.failures.len(),
                                "Scheduled overdue scan completed"
                            ),
                            Err(e) => tracing::error!(%today, error = %e, "Scheduled overdue scan failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{repository::Repository, services::{clock::FixedClock, notifications::MockNotifier}};
    use chrono::TimeZone;

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 8, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, nine()),
            Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_tomorrow_once_passed() {
        let now = Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, nine()),
            Utc.with_ymd_and_hms(2024, 3, 21, 9, 0, 0).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(
            next_run_after(now, nine()),
            Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap()
        );
    }

    fn scanner() -> OverdueScanner {
        OverdueScanner::new(Repository::in_memory(), Arc::new(MockNotifier::new()))
    }

    #[test]
    fn test_rejects_invalid_time() {
        let config = SchedulerConfig {
            enabled: true,
            hour: 24,
            minute: 0,
        };
        let clock = Arc::new(FixedClock(Utc::now().date_naive()));
        assert!(matches!(
            OverdueScheduler::new(scanner(), clock, &config),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_stops_on_shutdown() {
        let clock = Arc::new(FixedClock(Utc::now().date_naive()));
        let scheduler =
            OverdueScheduler::new(scanner(), clock, &SchedulerConfig::default()).unwrap();
        let shutdown = scheduler.shutdown_handle();
        let handle = scheduler.start();

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
