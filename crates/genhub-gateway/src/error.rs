//! JSON error envelope: every failure leaves the gateway as `{ "error": "..." }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use genhub_core::{BridgeError, StoreError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    /// Generative API error, passed through with its own status.
    Upstream { status: u16, message: String },
    /// Backend failure; message passed through verbatim.
    External(String),
    /// Anything else; detail goes to the log only.
    Internal(String),
}

impl ApiError {
    pub fn required(field: &str) -> Self {
        ApiError::BadRequest(format!("{} is required", field))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::External(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::External(m) => m.clone(),
            ApiError::Upstream { message, .. } => message.clone(),
            ApiError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ApiError::Internal(detail) => tracing::error!(%status, "internal error: {}", detail),
            ApiError::External(detail) => tracing::error!(%status, "backend error: {}", detail),
            ApiError::Upstream { message, .. } => {
                tracing::warn!(%status, "generative API error: {}", message)
            }
            _ => tracing::debug!(%status, "request rejected: {}", self.message()),
        }
        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::External(err.to_string())
    }
}

impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Upstream { status, message } => ApiError::Upstream { status, message },
            other => ApiError::External(other.to_string()),
        }
    }
}
