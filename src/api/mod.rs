//! API handlers for the circulation REST endpoints

pub mod health;
pub mod items;
pub mod loans;
pub mod members;
pub mod openapi;
pub mod overdue;
pub mod settings;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

/// Routes served under `/api/v1`
pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Items
        .route("/items", get(items::list_items).post(items::create_item))
        .route("/items/:id", get(items::get_item))
        .route("/items/:id/checkout", post(loans::checkout))
        .route("/items/:id/return", post(loans::return_item))
        .route("/items/:id/reconcile", post(items::reconcile_item))
        // Members
        .route("/members", get(members::list_members).post(members::create_member))
        .route("/members/top-active", get(members::top_active))
        .route("/members/:id", get(members::get_member))
        .route("/members/:id/loans", get(loans::get_member_loans))
        // Loans
        .route("/loans/stats", get(loans::get_loan_stats))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/extend", post(loans::extend_loan))
        // Overdue scan
        .route("/overdue/scan", post(overdue::run_scan))
        .route("/overdue/last-report", get(overdue::last_report))
        // Settings
        .route("/settings", get(settings::get_settings))
        .with_state(state)
}
