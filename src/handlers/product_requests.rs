use super::common::{
    created_response, page_response, success_response, transition_body, validate_input,
    JsonBody, OptionalJson, StatusListQuery,
};
use crate::{
    auth::Actor,
    entities::ProductRequestStatus,
    errors::ServiceError,
    services::{
        product_requests::{ApproveRequest, CreateProductRequestRequest, RejectRequest},
        state_machine::TransitionRequest,
    },
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

/// Request stock to be moved between two warehouses
pub async fn create_product_request(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateProductRequestRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let detail = state.services.product_requests.create(&actor, payload).await?;
    info!(
        product_request_id = %detail.request.id,
        request_number = %detail.request.request_number,
        "Product request created"
    );
    Ok(created_response(detail))
}

pub async fn get_product_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.services.product_requests.get(&actor, id).await?;
    Ok(success_response(detail))
}

pub async fn list_product_requests(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatusListQuery<ProductRequestStatus>>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = query.pagination().resolve(&state.config);
    let requests = state
        .services
        .product_requests
        .list(&actor, query.status, page, per_page)
        .await?;
    Ok(page_response(requests))
}

/// Approve per-line quantities and move the stock in one step
pub async fn approve_product_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    OptionalJson(approval): OptionalJson<ApproveRequest>,
) -> Result<Response, ServiceError> {
    let approval = approval.unwrap_or_default();
    let detail = state
        .services
        .product_requests
        .approve(&actor, id, approval)
        .await?;
    Ok(success_response(detail))
}

pub async fn reject_product_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<RejectRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let detail = state
        .services
        .product_requests
        .reject(&actor, id, payload)
        .await?;
    Ok(success_response(detail))
}

/// Acknowledge receipt at the destination
pub async fn complete_product_request(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state
        .services
        .product_requests
        .complete(&actor, id, request.expected_version)
        .await?;
    Ok(success_response(detail))
}

pub fn product_request_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_product_requests).post(create_product_request))
        .route("/:id", get(get_product_request))
        .route("/:id/approve", post(approve_product_request))
        .route("/:id/reject", post(reject_product_request))
        .route("/:id/complete", post(complete_product_request))
}
