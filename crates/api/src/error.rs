//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ordering::OrderingError;
use serde_json::{Value, json};

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Error raised by the ordering services.
    Ordering(OrderingError),
    /// Internal server error.
    Internal(String),
}

const INTERNAL_MESSAGE: &str = "internal server error";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Ordering(err) => ordering_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": INTERNAL_MESSAGE }),
                )
            }
        };

        (status, axum::Json(body)).into_response()
    }
}

fn ordering_error_to_response(err: OrderingError) -> (StatusCode, Value) {
    let message = err.to_string();
    match err {
        OrderingError::EstablishmentNotFound(_) | OrderingError::NotFound { .. } => {
            (StatusCode::NOT_FOUND, json!({ "error": message }))
        }
        OrderingError::ItemNotFound(ids) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "error": message, "missing_items": ids }),
        ),
        OrderingError::InsufficientStock(short) => {
            let shortfalls: Vec<Value> = short
                .iter()
                .map(|s| {
                    json!({
                        "item_id": s.item_id,
                        "item_name": s.item_name,
                        "requested": s.requested,
                        "available": s.available,
                    })
                })
                .collect();
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "error": message, "shortfalls": shortfalls }),
            )
        }
        OrderingError::Validation(_) | OrderingError::NoOrderProvided | OrderingError::NoSales => {
            (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": message }))
        }
        OrderingError::InvalidTransition { .. }
        | OrderingError::AlreadyCompleted(_)
        | OrderingError::Conflict(_) => (StatusCode::CONFLICT, json!({ "error": message })),
        OrderingError::StorageUnavailable(detail) => {
            tracing::error!(error = %detail, "storage unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": INTERNAL_MESSAGE }),
            )
        }
    }
}

impl From<OrderingError> for ApiError {
    fn from(err: OrderingError) -> Self {
        ApiError::Ordering(err)
    }
}
