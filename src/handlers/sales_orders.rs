use super::common::{
    created_response, page_response, success_response, transition_body, validate_input,
    JsonBody, OptionalJson, StatusChangeRequest, StatusListQuery,
};
use crate::{
    auth::Actor,
    entities::SalesOrderStatus,
    errors::ServiceError,
    services::{sales_orders::CreateSalesOrderRequest, state_machine::TransitionRequest},
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

/// Create a sales order in `Pending`
pub async fn create_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateSalesOrderRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let detail = state.services.sales_orders.create(&actor, payload).await?;
    info!(
        sales_order_id = %detail.order.id,
        order_number = %detail.order.order_number,
        "Sales order created"
    );
    Ok(created_response(detail))
}

/// Get a sales order with its lines
pub async fn get_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.services.sales_orders.get(&actor, id).await?;
    Ok(success_response(detail))
}

/// List sales orders, newest first
pub async fn list_sales_orders(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatusListQuery<SalesOrderStatus>>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = query.pagination().resolve(&state.config);
    let orders = state
        .services
        .sales_orders
        .list(&actor, query.status, page, per_page)
        .await?;
    Ok(page_response(orders))
}

/// Status history of a sales order in the order it happened
pub async fn get_sales_order_tracking(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let tracking = state.services.sales_orders.tracking(&actor, id).await?;
    Ok(success_response(tracking))
}

/// Pending -> Confirmed, after checking availability
pub async fn confirm_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.sales_orders.confirm(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Confirmed -> Shipped
pub async fn ship_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.sales_orders.ship(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Shipped -> Delivered
pub async fn deliver_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.sales_orders.deliver(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Cancel a sales order that has not shipped
pub async fn cancel_sales_order(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.sales_orders.cancel(&actor, id, request).await?;
    Ok(success_response(detail))
}

pub async fn update_sales_order_status(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<StatusChangeRequest<SalesOrderStatus>>,
) -> Result<Response, ServiceError> {
    let (target, request) = payload.into_parts();
    validate_input(&request)?;
    let detail = state
        .services
        .sales_orders
        .transition(&actor, id, target, request)
        .await?;
    Ok(success_response(detail))
}

pub fn sales_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_sales_orders).post(create_sales_order))
        .route("/:id", get(get_sales_order))
        .route("/:id/tracking", get(get_sales_order_tracking))
        .route("/:id/confirm", post(confirm_sales_order))
        .route("/:id/ship", post(ship_sales_order))
        .route("/:id/deliver", post(deliver_sales_order))
        .route("/:id/cancel", post(cancel_sales_order))
        .route("/:id/status", post(update_sales_order_status))
}
