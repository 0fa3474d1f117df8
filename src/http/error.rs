//! Error responses: `{ "error": <message>, "code": <code> }`

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, error};
use validator::ValidationErrors;

use crate::EngineError;

#[derive(Debug)]
pub enum ApiError {
    Engine(EngineError),
    Invalid(String),
    MissingCustomer,
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self { Self::Engine(e) }
}

impl From<ValidationErrors> for ApiError {
    fn from(e: ValidationErrors) -> Self { Self::Invalid(e.to_string()) }
}

// Malformed bodies, paths and query strings get the same JSON shape as engine errors.
impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self { Self::Invalid(e.body_text()) }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self { Self::Invalid(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self { Self::Invalid(e.body_text()) }
}

fn status_of(e: &EngineError) -> StatusCode {
    match e {
        EngineError::CartNotFound(_) | EngineError::ItemNotFound(_) | EngineError::ProductNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::Conflict(_) => StatusCode::CONFLICT,
        EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        EngineError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Engine(e) => {
                let status = status_of(&e);
                if e.is_client_error() {
                    debug!(code = e.code(), error = %e, "request rejected");
                } else {
                    error!(code = e.code(), error = %e, "request failed");
                }
                let mut body = json!({"error": e.to_string(), "code": e.code()});
                if let EngineError::InsufficientStock { available, .. } = e {
                    body["available"] = json!(available);
                }
                (status, body)
            }
            Self::Invalid(msg) => (StatusCode::BAD_REQUEST, json!({"error": msg, "code": "invalid_request"})),
            Self::MissingCustomer => (
                StatusCode::UNAUTHORIZED,
                json!({"error": "Missing customer identity", "code": "unauthenticated"}),
            ),
        };
        (status, Json(body)).into_response()
    }
}
