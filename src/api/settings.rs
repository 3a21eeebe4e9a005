//! Settings endpoint: the lending policy the server runs with

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{config::StorageBackend, AppState};

/// Loan policy
#[derive(Serialize, ToSchema)]
pub struct LoanSettings {
    /// Loan duration in days
    pub loan_period_days: i64,
}

/// Daily overdue scan
#[derive(Serialize, ToSchema)]
pub struct OverdueScanSettings {
    pub enabled: bool,
    /// Time of day of the scan, `HH:MM` in UTC
    pub time_utc: String,
}

/// Settings response
#[derive(Serialize, ToSchema)]
pub struct SettingsResponse {
    pub loans: LoanSettings,
    pub overdue_scan: OverdueScanSettings,
    /// Storage backend (`postgres` or `memory`)
    pub storage: String,
    /// Whether notifications go out by email rather than to the log
    pub email_enabled: bool,
}

/// Get the current settings
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings", body = SettingsResponse)
    )
)]
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let config = &state.config;
    let storage = match config.database.backend {
        StorageBackend::Postgres => "postgres",
        StorageBackend::Memory => "memory",
    };

    Json(SettingsResponse {
        loans: LoanSettings {
            loan_period_days: config.loans.loan_period_days,
        },
        overdue_scan: OverdueScanSettings {
            enabled: config.scheduler.enabled,
            time_utc: format!("{:02}:{:02}", config.scheduler.hour, config.scheduler.minute),
        },
        storage: storage.to_string(),
        email_enabled: config.email.enabled,
    })
}
