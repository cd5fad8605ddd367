use super::common::{
    created_response, page_response, success_response, transition_body, validate_input,
    JsonBody, OptionalJson, StatusChangeRequest, StatusListQuery,
};
use crate::{
    auth::Actor,
    entities::PurchaseOrderStatus,
    errors::ServiceError,
    services::{purchase_orders::CreatePurchaseOrderRequest, state_machine::TransitionRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Create a purchase order in `Pending`
pub async fn create_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreatePurchaseOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let detail = state.services.purchase_orders.create(&actor, payload).await?;
    info!(
        purchase_order_id = %detail.order.id,
        order_number = %detail.order.order_number,
        "Purchase order created"
    );
    Ok(created_response(detail))
}

/// Get a purchase order with its lines
pub async fn get_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.services.purchase_orders.get(&actor, id).await?;
    Ok(success_response(detail))
}

/// List purchase orders, newest first
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatusListQuery<PurchaseOrderStatus>>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = query.pagination().resolve(&state.config);
    let orders = state
        .services
        .purchase_orders
        .list(&actor, query.status, page, per_page)
        .await?;
    Ok(page_response(orders))
}

/// Pending -> Approved
pub async fn approve_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.purchase_orders.approve(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Approved -> Received; books the goods into stock
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.purchase_orders.receive(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Cancel a purchase order that has not been received
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.purchase_orders.cancel(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Move a purchase order to any status the lifecycle allows
pub async fn update_purchase_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<StatusChangeRequest<PurchaseOrderStatus>>,
) -> Result<Response, ServiceError> {
    let (target, request) = payload.into_parts();
    validate_input(&request)?;
    let detail = state
        .services
        .purchase_orders
        .transition(&actor, id, target, request)
        .await?;
    Ok(success_response(detail))
}

pub fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_purchase_orders).post(create_purchase_order))
        .route("/:id", get(get_purchase_order))
        .route("/:id/approve", post(approve_purchase_order))
        .route("/:id/receive", post(receive_purchase_order))
        .route("/:id/cancel", post(cancel_purchase_order))
        .route("/:id/status", post(update_purchase_order_status))
}
