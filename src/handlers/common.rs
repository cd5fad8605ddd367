use crate::{
    config::AppConfig,
    errors::ServiceError,
    services::{state_machine::TransitionRequest, Page},
    ApiResponse, PaginatedResponse,
};
use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use validator::Validate;

/// Standard success response
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Wraps one page of results together with its pagination numbers
pub fn page_response<T: Serialize>(page: Page<T>) -> Response {
    success_response(PaginatedResponse::from(page))
}

/// Validate request input
pub fn validate_input<T: Validate>(input: &T) -> Result<(), ServiceError> {
    input
        .validate()
        .map_err(|e| ServiceError::ValidationError(format!("Validation failed: {}", e)))
}

/// Transition endpoints accept an optional body; an absent one means no notes
pub fn transition_body(body: OptionalJson<TransitionRequest>) -> Result<TransitionRequest, ServiceError> {
    let request = body.0.unwrap_or_default();
    validate_input(&request)?;
    Ok(request)
}

/// Required JSON body. Any rejection surfaces as a `ValidationError` so the
/// client gets the standard error envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// JSON body that may be left out entirely. An empty body yields `None`;
/// a body that is present but does not parse is rejected.
#[derive(Debug, Clone, Default)]
pub struct OptionalJson<T>(pub Option<T>);

#[async_trait]
impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| ServiceError::ValidationError(rejection.body_text()))?;
        parse_optional_body(&bytes).map(Self)
    }
}

fn parse_optional_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>, ServiceError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|e| ServiceError::ValidationError(format!("Malformed JSON body: {}", e)))
}

/// Pagination parameters for list operations
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct PaginationParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PaginationParams {
    /// Resolves `(page, per_page)`, clamping the page size to the configured maximum
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.page_size(self.per_page))
    }
}

/// Query string for list endpoints that can filter on lifecycle status
#[derive(Debug, Deserialize)]
pub struct StatusListQuery<S> {
    pub status: Option<S>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl<S> StatusListQuery<S> {
    pub fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Body of the generic `/{id}/status` endpoints
#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest<S> {
    pub status: S,
    pub notes: Option<String>,
    pub expected_version: Option<i32>,
}

impl<S> StatusChangeRequest<S> {
    pub fn into_parts(self) -> (S, TransitionRequest) {
        (
            self.status,
            TransitionRequest {
                notes: self.notes,
                expected_version: self.expected_version,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::PurchaseOrderStatus;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "test".into(),
        )
    }

    #[test]
    fn pagination_defaults_and_clamps() {
        let cfg = config();
        assert_eq!(PaginationParams::default().resolve(&cfg), (1, 20));

        let params = PaginationParams {
            page: Some(0),
            per_page: Some(5_000),
        };
        assert_eq!(params.resolve(&cfg), (1, 100));
    }

    #[test]
    fn status_change_body_splits_into_transition() {
        let body: StatusChangeRequest<PurchaseOrderStatus> = serde_json::from_str(
            r#"{"status":"Approved","notes":"ok","expected_version":3}"#,
        )
        .unwrap();
        let (status, request) = body.into_parts();
        assert_eq!(status, PurchaseOrderStatus::Approved);
        assert_eq!(request.notes.as_deref(), Some("ok"));
        assert_eq!(request.expected_version, Some(3));
    }

    #[test]
    fn unknown_status_is_rejected_at_deserialization() {
        let body = serde_json::from_str::<StatusChangeRequest<PurchaseOrderStatus>>(
            r#"{"status":"Shipped"}"#,
        );
        assert!(body.is_err());
    }

    #[test]
    fn blank_optional_body_is_absent() {
        let body = parse_optional_body::<TransitionRequest>(b"").unwrap();
        assert!(body.is_none());
        let body = parse_optional_body::<TransitionRequest>(b" \n").unwrap();
        assert!(body.is_none());
    }

    #[test]
    fn mistyped_optional_body_is_a_validation_error() {
        let err = parse_optional_body::<TransitionRequest>(br#"{"expected_version":"99"}"#)
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let err = parse_optional_body::<TransitionRequest>(b"{not json").unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        let body = parse_optional_body::<TransitionRequest>(br#"{"expected_version":99}"#)
            .unwrap()
            .unwrap();
        assert_eq!(body.expected_version, Some(99));
    }
}
