//! Member endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::member::{CreateMember, Member, MemberActivity},
    AppState,
};

/// List members
#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    responses(
        (status = 200, description = "All members", body = Vec<Member>)
    )
)]
pub async fn list_members(State(state): State<AppState>) -> AppResult<Json<Vec<Member>>> {
    let members = state.services.members.list_members().await?;
    Ok(Json(members))
}

/// Get member by ID
#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    params(
        ("id" = i32, Path, description = "Member ID")
    ),
    responses(
        (status = 200, description = "Member details", body = Member),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Member>> {
    let member = state.services.members.get_member(id).await?;
    Ok(Json(member))
}

/// Create a new member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member created", body = Member),
        (status = 400, description = "Invalid request or username taken")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    Json(member): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<Member>)> {
    let created = state.services.members.create_member(&member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Top 5 members by number of active loans
#[utoipa::path(
    get,
    path = "/members/top-active",
    tag = "members",
    responses(
        (status = 200, description = "Most active members", body = Vec<MemberActivity>)
    )
)]
pub async fn top_active(State(state): State<AppState>) -> AppResult<Json<Vec<MemberActivity>>> {
    let members = state.services.members.top_active().await?;
    Ok(Json(members))
}
