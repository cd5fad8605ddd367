use super::common::{
    created_response, page_response, success_response, transition_body, validate_input,
    JsonBody, OptionalJson, StatusListQuery,
};
use crate::{
    auth::Actor,
    entities::AssemblyStatus,
    errors::ServiceError,
    services::{assemblies::CreateAssemblyRequest, state_machine::TransitionRequest},
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

/// Create an assembly with its bill of materials
pub async fn create_assembly(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateAssemblyRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let detail = state.services.assemblies.create(&actor, payload).await?;
    info!(
        assembly_id = %detail.assembly.id,
        assembly_number = %detail.assembly.assembly_number,
        "Assembly created"
    );
    Ok(created_response(detail))
}

pub async fn get_assembly(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let detail = state.services.assemblies.get(&actor, id).await?;
    Ok(success_response(detail))
}

pub async fn list_assemblies(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<StatusListQuery<AssemblyStatus>>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = query.pagination().resolve(&state.config);
    let assemblies = state
        .services
        .assemblies
        .list(&actor, query.status, page, per_page)
        .await?;
    Ok(page_response(assemblies))
}

/// Report material sufficiency without changing anything
pub async fn validate_assembly(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let validation = state.services.assemblies.validate(&actor, id).await?;
    Ok(success_response(validation))
}

pub async fn start_assembly(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.assemblies.start(&actor, id, request).await?;
    Ok(success_response(detail))
}

/// Consume materials and book the finished product
pub async fn complete_assembly(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.assemblies.complete(&actor, id, request).await?;
    Ok(success_response(detail))
}

pub async fn cancel_assembly(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    body: OptionalJson<TransitionRequest>,
) -> Result<Response, ServiceError> {
    let request = transition_body(body)?;
    let detail = state.services.assemblies.cancel(&actor, id, request).await?;
    Ok(success_response(detail))
}

pub fn assembly_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_assemblies).post(create_assembly))
        .route("/:id", get(get_assembly))
        .route("/:id/validate", get(validate_assembly))
        .route("/:id/start", post(start_assembly))
        .route("/:id/complete", post(complete_assembly))
        .route("/:id/cancel", post(cancel_assembly))
}
