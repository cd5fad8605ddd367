use super::common::{success_response, JsonBody};
use crate::{
    auth::Actor,
    errors::ServiceError,
    services::reports::{RegenerateSummariesRequest, SummaryFilter},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ValuationQuery {
    pub warehouse_id: Option<Uuid>,
}

/// Stored daily summaries matching the filter
pub async fn list_summaries(
    State(state): State<AppState>,
    actor: Actor,
    Query(filter): Query<SummaryFilter>,
) -> Result<Response, ServiceError> {
    let summaries = state.services.reports.summaries(&actor, filter).await?;
    Ok(success_response(summaries))
}

/// Rebuild daily summaries for a date range from the movement ledger
pub async fn regenerate_summaries(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(payload): JsonBody<RegenerateSummariesRequest>,
) -> Result<Response, ServiceError> {
    let report = state
        .services
        .reports
        .regenerate_summaries(&actor, payload)
        .await?;
    info!(
        from = %report.from,
        to = %report.to,
        rows = report.rows,
        "Summaries regenerated"
    );
    Ok(success_response(report))
}

/// Current stock valued at catalog price
pub async fn stock_valuation(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<ValuationQuery>,
) -> Result<Response, ServiceError> {
    let valuation = state
        .services
        .reports
        .stock_valuation(&actor, query.warehouse_id)
        .await?;
    Ok(success_response(valuation))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/summaries", get(list_summaries))
        .route("/summaries/regenerate", post(regenerate_summaries))
        .route("/valuation", get(stock_valuation))
}
