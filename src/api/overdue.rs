//! Overdue scan endpoints

use axum::{extract::State, Json};

use crate::{
    error::{AppError, AppResult},
    services::overdue::ScanReport,
    AppState,
};

/// Run the overdue scan now
#[utoipa::path(
    post,
    path = "/overdue/scan",
    tag = "overdue",
    responses(
        (status = 200, description = "Scan finished", body = ScanReport)
    )
)]
pub async fn run_scan(State(state): State<AppState>) -> AppResult<Json<ScanReport>> {
    let today = state.services.clock.today();
    let report = state.services.overdue.scan(today).await?;
    Ok(Json(report))
}

/// Report of the most recent scan
#[utoipa::path(
    get,
    path = "/overdue/last-report",
    tag = "overdue",
    responses(
        (status = 200, description = "Latest scan report", body = ScanReport),
        (status = 404, description = "No scan has run since startup")
    )
)]
pub async fn last_report(State(state): State<AppState>) -> AppResult<Json<ScanReport>> {
    state
        .services
        .overdue
        .last_report()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No overdue scan has run yet".to_string()))
}
