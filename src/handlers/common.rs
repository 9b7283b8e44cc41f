use axum::{http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::{errors::ServiceError, ApiResponse};

/// `{"data": ...}` payload used by read-only report endpoints.
#[derive(Debug, Serialize)]
pub struct DataPayload<T> {
    pub data: T,
}

/// Payload for responses that carry only a message.
#[derive(Debug, Default, Serialize)]
pub struct Empty {}

#[derive(Debug, Serialize)]
pub struct CountPayload {
    pub count: u64,
}

/// A path id that is not a UUID cannot name a stored record, so it is
/// reported the same way as an unknown id.
pub fn parse_id(raw: &str, not_found_message: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::NotFound(not_found_message.to_string()))
}

/// Standard created response
pub fn created_response<T: Serialize>(body: ApiResponse<T>) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, Json(body))
}
