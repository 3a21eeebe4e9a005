//! Circulation Library Lending Server
//!
//! Lends items to members while keeping each item's available-copy count
//! consistent under concurrent checkouts and returns, and runs a daily scan
//! that reminds members of overdue loans.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult, LendingError};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
