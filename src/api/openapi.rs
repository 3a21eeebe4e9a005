//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{health, items, loans, members, overdue, settings};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "0.1.0",
        description = "Library lending REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Items
        items::list_items,
        items::get_item,
        items::create_item,
        items::reconcile_item,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::top_active,
        // Loans
        loans::checkout,
        loans::return_item,
        loans::extend_loan,
        loans::get_loan,
        loans::get_member_loans,
        loans::get_loan_stats,
        // Overdue
        overdue::run_scan,
        overdue::last_report,
        // Settings
        settings::get_settings,
    ),
    components(
        schemas(
            // Items
            crate::models::item::Item,
            crate::models::item::CreateItem,
            crate::services::inventory::Reconciliation,
            // Members
            crate::models::member::Member,
            crate::models::member::CreateMember,
            crate::models::member::MemberActivity,
            // Loans
            loans::MemberRequest,
            loans::ExtendLoanRequest,
            loans::LoanResponse,
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            crate::models::loan::LoanView,
            crate::services::loans::LoanStats,
            // Overdue
            crate::services::overdue::ScanReport,
            crate::services::overdue::DispatchFailure,
            // Settings
            settings::SettingsResponse,
            settings::LoanSettings,
            settings::OverdueScanSettings,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "items", description = "Catalog items and availability"),
        (name = "members", description = "Member management"),
        (name = "loans", description = "Checkout, return and extension"),
        (name = "overdue", description = "Overdue loan scan"),
        (name = "settings", description = "Lending policy in effect")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
