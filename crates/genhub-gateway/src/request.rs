//! Body parsing shared by the JSON handlers. Parsing is done by hand instead of
//! through `Json<T>` so malformed bodies and missing fields both come back as
//! 400 with our own envelope.

use axum::body::Bytes;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

pub fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("request body must be a JSON object".to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}

/// Trimmed, non-empty value of a required field.
pub fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::required(field))
}

/// Trimmed optional field; blank becomes `None`.
pub fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
