use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::attribute::AccessLevel;
use crate::config::Config;
use crate::telescope::{Command, Telescope};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub telescope: Arc<Mutex<Telescope>>,
}

/// Holder of a configured API key, resolved from `Authorization: Bearer <key>`.
#[derive(Clone)]
pub struct Operator {
    pub name: String,
    pub level: AccessLevel,
}

impl Operator {
    pub fn may_send(&self, command: &Command) -> bool {
        self.level >= command.required_level()
    }
}

pub enum AuthError {
    MissingKey,
    MalformedHeader,
    UnknownKey,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => "an API key is required to reach the antenna",
            AuthError::MalformedHeader => "expected 'Authorization: Bearer <key>'",
            AuthError::UnknownKey => "API key not recognised",
        };
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response()
    }
}

/// A command above the caller's access level.
pub struct PermissionError {
    pub command: &'static str,
    pub required: AccessLevel,
}

impl IntoResponse for PermissionError {
    fn into_response(self) -> Response {
        let message = format!("{} requires {} access", self.command, self.required);
        (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "forbidden", "message": message })),
        )
            .into_response()
    }
}

impl FromRequestParts<AppState> for Operator {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingKey)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        let key = header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader)?;

        let api_key = state
            .config
            .find_api_key(key.trim())
            .ok_or(AuthError::UnknownKey)?;
        Ok(Operator {
            name: api_key.name.clone(),
            level: api_key.level,
        })
    }
}

pub fn authorize(operator: &Operator, command: &Command) -> Result<(), PermissionError> {
    if operator.may_send(command) {
        return Ok(());
    }
    let required = command.required_level();
    log::warn!(
        "{} ({} access) may not send {}",
        operator.name,
        operator.level,
        command.name()
    );
    Err(PermissionError {
        command: command.name(),
        required,
    })
}
