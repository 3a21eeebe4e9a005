//! Loan endpoints: checkout, return, extension and lookups

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::loan::{Loan, LoanView},
    services::loans::LoanStats,
    AppState,
};

/// Checkout or return request
#[derive(Deserialize, ToSchema)]
pub struct MemberRequest {
    /// Borrowing member
    pub member_id: i32,
}

/// Extend loan request
#[derive(Deserialize, ToSchema)]
pub struct ExtendLoanRequest {
    /// Days added to the due date (must be positive)
    pub additional_days: i64,
}

/// Loan response with a status message
#[derive(Serialize, ToSchema)]
pub struct LoanResponse {
    pub status: String,
    pub loan: Loan,
}

/// Check out one copy of an item
#[utoipa::path(
    post,
    path = "/items/{id}/checkout",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = MemberRequest,
    responses(
        (status = 201, description = "Loan created", body = LoanResponse),
        (status = 404, description = "Item or member not found"),
        (status = 409, description = "No copies available")
    )
)]
pub async fn checkout(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    Json(request): Json<MemberRequest>,
) -> AppResult<(StatusCode, Json<LoanResponse>)> {
    let loan = state
        .services
        .loans
        .checkout(item_id, request.member_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(LoanResponse {
            status: "Book loaned successfully.".to_string(),
            loan,
        }),
    ))
}

/// Return a member's copy of an item
#[utoipa::path(
    post,
    path = "/items/{id}/return",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    request_body = MemberRequest,
    responses(
        (status = 200, description = "Item returned", body = LoanResponse),
        (status = 404, description = "No active loan for this item and member"),
        (status = 409, description = "Already returned")
    )
)]
pub async fn return_item(
    State(state): State<AppState>,
    Path(item_id): Path<i32>,
    Json(request): Json<MemberRequest>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state
        .services
        .loans
        .return_item(item_id, request.member_id)
        .await?;

    Ok(Json(LoanResponse {
        status: "Book returned successfully.".to_string(),
        loan,
    }))
}

/// Extend the due date of a loan
#[utoipa::path(
    post,
    path = "/loans/{id}/extend",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    request_body = ExtendLoanRequest,
    responses(
        (status = 200, description = "Due date extended", body = LoanResponse),
        (status = 400, description = "Invalid number of days"),
        (status = 404, description = "Loan not found"),
        (status = 409, description = "Loan overdue, already returned or contended")
    )
)]
pub async fn extend_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<i32>,
    Json(request): Json<ExtendLoanRequest>,
) -> AppResult<Json<LoanResponse>> {
    let loan = state
        .services
        .loans
        .extend(loan_id, request.additional_days)
        .await?;

    Ok(Json(LoanResponse {
        status: format!("Due date extended by {} days.", request.additional_days),
        loan,
    }))
}

/// Get a loan with its current status
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Loan ID")
    ),
    responses(
        (status = 200, description = "Loan details", body = LoanView),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<LoanView>> {
    let loan = state.services.loans.get_loan(loan_id).await?;
    Ok(Json(loan))
}

/// Get the active loans of a member
#[utoipa::path(
    get,
    path = "/members/{id}/loans",
    tag = "loans",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member's active loans", body = Vec<LoanView>),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member_loans(
    State(state): State<AppState>,
    Path(member_id): Path<i32>,
) -> AppResult<Json<Vec<LoanView>>> {
    let loans = state.services.loans.member_loans(member_id).await?;
    Ok(Json(loans))
}

/// Count active and overdue loans
#[utoipa::path(
    get,
    path = "/loans/stats",
    tag = "loans",
    responses(
        (status = 200, description = "Loan counters", body = LoanStats)
    )
)]
pub async fn get_loan_stats(State(state): State<AppState>) -> AppResult<Json<LoanStats>> {
    let stats = state.services.loans.stats().await?;
    Ok(Json(stats))
}
