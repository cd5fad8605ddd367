use super::common::{
    created_response, page_response, success_response, validate_input, JsonBody, PaginationParams,
};
use crate::{
    auth::Actor,
    entities::MovementType,
    errors::ServiceError,
    services::inventory::{AdjustStockRequest, DefaultLevelsRequest, MovementFilter},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct BalanceListQuery {
    pub warehouse_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct WarehouseQuery {
    pub warehouse_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MovementListQuery {
    pub product_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub movement_type: Option<MovementType>,
    pub reference_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// List stored balances, optionally for one warehouse
pub async fn list_balances(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<BalanceListQuery>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve(&state.config);

    let balances = state
        .services
        .inventory
        .list_balances(&actor, query.warehouse_id, page, per_page)
        .await?;
    Ok(page_response(balances))
}

/// Get the balance of one product at one warehouse
pub async fn get_balance(
    State(state): State<AppState>,
    actor: Actor,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    let balance = state
        .services
        .inventory
        .get_balance(&actor, product_id, warehouse_id)
        .await?;
    Ok(success_response(balance))
}

/// Balances at or below their minimum threshold
pub async fn low_stock(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<WarehouseQuery>,
) -> Result<Response, ServiceError> {
    let balances = state
        .services
        .inventory
        .low_stock(&actor, query.warehouse_id)
        .await?;
    Ok(success_response(balances))
}

/// Record a manual stock adjustment
pub async fn adjust_stock(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<AdjustStockRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let applied = state.services.inventory.adjust(&actor, payload).await?;
    Ok(created_response(applied))
}

/// Apply default minimum/maximum thresholds to balance rows
pub async fn set_default_levels(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<DefaultLevelsRequest>,
) -> Result<Response, ServiceError> {
    let updated = state
        .services
        .inventory
        .set_default_minimum_levels(&actor, payload)
        .await?;
    info!(updated, "Default stock levels applied");
    Ok(success_response(json!({ "updated": updated })))
}

/// Compare a stored balance with the sum of its movements
pub async fn verify_balance(
    State(state): State<AppState>,
    actor: Actor,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ServiceError> {
    let verification = state
        .services
        .inventory
        .verify_balance(&actor, product_id, warehouse_id)
        .await?;
    Ok(success_response(verification))
}

/// Movement history, newest first
pub async fn list_movements(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<MovementListQuery>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve(&state.config);

    let filter = MovementFilter {
        product_id: query.product_id,
        warehouse_id: query.warehouse_id,
        movement_type: query.movement_type,
        reference_id: query.reference_id,
    };
    let movements = state
        .services
        .inventory
        .movements(&actor, filter, page, per_page)
        .await?;
    Ok(page_response(movements))
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/balances", get(list_balances))
        .route("/balances/:product_id/:warehouse_id", get(get_balance))
        .route(
            "/balances/:product_id/:warehouse_id/verify",
            get(verify_balance),
        )
        .route("/low-stock", get(low_stock))
        .route("/adjustments", post(adjust_stock))
        .route("/default-levels", post(set_default_levels))
}

pub fn movement_routes() -> Router<AppState> {
    Router::new().route("/", get(list_movements))
}
