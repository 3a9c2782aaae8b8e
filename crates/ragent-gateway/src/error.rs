use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// JSON body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short, stable error label.
    pub error: String,
    /// Human-readable cause, present only for client errors.
    pub detail: Option<String>,
}

/// Failures a handler can return.
#[derive(Debug)]
pub enum ApiError {
    /// The request was malformed or failed validation (422).
    Validation(String),
    /// Processing failed. The cause has been logged; clients see a fixed
    /// message (500).
    Internal,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Validation(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorResponse {
                    error: "Invalid request".to_string(),
                    detail: Some(detail),
                },
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse {
                    error: "Error processing query".to_string(),
                    detail: None,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}
