//! Item endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::item::{CreateItem, Item},
    services::inventory::Reconciliation,
    AppState,
};

/// List all items
#[utoipa::path(
    get,
    path = "/items",
    tag = "items",
    responses(
        (status = 200, description = "All items", body = Vec<Item>)
    )
)]
pub async fn list_items(State(state): State<AppState>) -> AppResult<Json<Vec<Item>>> {
    let items = state.services.catalog.list_items().await?;
    Ok(Json(items))
}

/// Get an item with its availability
#[utoipa::path(
    get,
    path = "/items/{id}",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Item details", body = Item),
        (status = 404, description = "Item not found")
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Item>> {
    let item = state.services.catalog.get_item(id).await?;
    Ok(Json(item))
}

/// Create a new item
#[utoipa::path(
    post,
    path = "/items",
    tag = "items",
    request_body = CreateItem,
    responses(
        (status = 201, description = "Item created", body = Item),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    Json(item): Json<CreateItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let created = state.services.catalog.create_item(&item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Re-derive available copies from active loans
#[utoipa::path(
    post,
    path = "/items/{id}/reconcile",
    tag = "items",
    params(
        ("id" = i32, Path, description = "Item ID")
    ),
    responses(
        (status = 200, description = "Availability reconciled", body = Reconciliation),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Availability changed while reconciling"),
        (status = 500, description = "More active loans than copies")
    )
)]
pub async fn reconcile_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Reconciliation>> {
    let report = state.services.inventory.reconcile(id).await?;
    Ok(Json(report))
}
