use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use service::store::StoreError;
use service::ServiceError;
use tracing::{error, warn};

/// Error body returned by the JSON API: `{"error": title, "detail": message}`.
#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub error: &'static str,
    pub detail: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, error: &'static str, detail: Option<String>) -> Self {
        Self { status, error, detail }
    }

    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found", Some(format!("{kind} {id} not found")))
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        let body = match self.detail {
            Some(detail) => json!({"error": self.error, "detail": detail}),
            None => json!({"error": self.error}),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(_) | ServiceError::Model(_) => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, "Validation Error", Some(e.to_string()))
            }
            ServiceError::AlreadyExists(_) => Self::new(StatusCode::BAD_REQUEST, "Already Exists", Some(e.to_string())),
            ServiceError::Store(StoreError::Timeout(_)) => {
                warn!(error = %e, "store timeout");
                Self::new(StatusCode::GATEWAY_TIMEOUT, "Store Timeout", None)
            }
            ServiceError::Store(StoreError::Unavailable(_) | StoreError::Unauthorized(_)) => {
                error!(error = %e, "store unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "Store Unavailable", None)
            }
            other => {
                error!(error = %other, "request failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                    Some("An internal error occurred".into()),
                )
            }
        }
    }
}

impl From<JsonRejection> for JsonApiError {
    fn from(rejection: JsonRejection) -> Self {
        let error = if rejection.status() == StatusCode::UNPROCESSABLE_ENTITY { "Validation Error" } else { "Invalid Body" };
        Self::new(rejection.status(), error, Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for JsonApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), "Invalid Query", Some(rejection.body_text()))
    }
}
