use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::attribute::AttributeError;
use crate::telescope::TelescopeError;
use crate::web::auth::PermissionError;

pub enum ApiError {
    Permission(PermissionError),
    Validation(String),
    NotFound(String),
    Conflict(String),
    Hardware(String),
    Internal(String),
}

impl From<PermissionError> for ApiError {
    fn from(e: PermissionError) -> Self {
        ApiError::Permission(e)
    }
}

impl From<TelescopeError> for ApiError {
    fn from(e: TelescopeError) -> Self {
        let message = e.to_string();
        match e {
            TelescopeError::UnknownCommand(_)
            | TelescopeError::WrongArgumentCount { .. }
            | TelescopeError::InvalidArgument(_)
            | TelescopeError::InvalidAngle { .. }
            | TelescopeError::Astro(_) => ApiError::Validation(message),
            TelescopeError::FatalState(_) | TelescopeError::NotReady(_) => {
                ApiError::Conflict(message)
            }
            TelescopeError::Hardware(_) => ApiError::Hardware(message),
            TelescopeError::Attribute(AttributeError::UnknownKey(key)) => ApiError::NotFound(key),
            TelescopeError::Attribute(_) | TelescopeError::Config(_) => ApiError::Internal(message),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Permission(e) => e.into_response(),
            ApiError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_message("invalid_command", &msg)),
            )
                .into_response(),
            ApiError::NotFound(key) => (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::with_message("attribute_not_found", &key)),
            )
                .into_response(),
            ApiError::Conflict(msg) => (
                StatusCode::CONFLICT,
                Json(ErrorResponse::with_message("invalid_state", &msg)),
            )
                .into_response(),
            ApiError::Hardware(msg) => (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse::with_message("hardware_error", &msg)),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_message("internal_error", &msg)),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn with_message(error: &str, message: &str) -> Self {
        ErrorResponse {
            error: error.to_string(),
            message: Some(message.to_string()),
        }
    }
}
