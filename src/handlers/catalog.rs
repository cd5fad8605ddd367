use super::common::{
    created_response, page_response, success_response, validate_input, JsonBody, PaginationParams,
};
use crate::{
    auth::Actor,
    errors::ServiceError,
    services::catalog::{CreateProductRequest, CreateWarehouseRequest},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    routing::get,
    Router,
};
use tracing::info;
use uuid::Uuid;

/// Create a product
pub async fn create_product(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateProductRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let product = state.services.catalog.create_product(&actor, payload).await?;
    info!(product_id = %product.id, sku = %product.sku, "Product created");
    Ok(created_response(product))
}

/// Get a product by ID
pub async fn get_product(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let product = state.services.catalog.get_product(&actor, id).await?;
    Ok(success_response(product))
}

/// List products ordered by SKU
pub async fn list_products(
    State(state): State<AppState>,
    actor: Actor,
    Query(params): Query<PaginationParams>,
) -> Result<Response, ServiceError> {
    let (page, per_page) = params.resolve(&state.config);
    let products = state
        .services
        .catalog
        .list_products(&actor, page, per_page)
        .await?;
    Ok(page_response(products))
}

/// Create a warehouse
pub async fn create_warehouse(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<CreateWarehouseRequest>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let warehouse = state
        .services
        .catalog
        .create_warehouse(&actor, payload)
        .await?;
    info!(warehouse_id = %warehouse.id, code = %warehouse.code, "Warehouse created");
    Ok(created_response(warehouse))
}

/// Get a warehouse by ID
pub async fn get_warehouse(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let warehouse = state.services.catalog.get_warehouse(&actor, id).await?;
    Ok(success_response(warehouse))
}

/// List all warehouses
pub async fn list_warehouses(
    State(state): State<AppState>,
    actor: Actor,
) -> Result<Response, ServiceError> {
    let warehouses = state.services.catalog.list_warehouses(&actor).await?;
    Ok(success_response(warehouses))
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:id", get(get_product))
}

pub fn warehouse_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_warehouses).post(create_warehouse))
        .route("/:id", get(get_warehouse))
}
