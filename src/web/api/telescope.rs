use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::attribute::AttributeSnapshot;
use crate::telescope::{Command, Outcome, TelescopeReport, TelescopeStatus};
use crate::web::api::error::{ApiResult, ErrorResponse};
use crate::web::auth::{authorize, AppState, Operator};

#[derive(Debug, Serialize, ToSchema)]
pub struct CommandResponse {
    pub command: String,
    pub status: TelescopeStatus,
    /// Console rendering of the result.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<TelescopeReport>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub status: TelescopeStatus,
    pub control_loop_running: bool,
    pub pointing_ready: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReadyQuery {
    /// Defaults to the configured tolerance.
    pub tolerance_arcsec: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    pub ready: bool,
}

#[utoipa::path(
    post,
    path = "/api/telescope/command",
    request_body(content = String, content_type = "text/plain", description = "One console command line, e.g. `AZEL 100 45`"),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Command executed", body = CommandResponse),
        (status = 400, description = "Unknown command or invalid arguments", body = ErrorResponse),
        (status = 409, description = "Command not allowed in the current state", body = ErrorResponse),
        (status = 502, description = "ACU communication failed", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Insufficient access level", body = ErrorResponse)
    ),
    tag = "telescope"
)]
pub async fn command(
    State(state): State<AppState>,
    operator: Operator,
    body: String,
) -> ApiResult<Json<CommandResponse>> {
    let command = Command::parse(&body)?;
    authorize(&operator, &command)?;
    log::info!("{} sent '{}'", operator.name, body.trim());

    let name = command.name().to_string();
    let mut telescope = state.telescope.lock().await;
    let outcome = telescope.execute(command).await?;
    let output = outcome.to_string();
    let report = match outcome {
        Outcome::Report(report) => Some(*report),
        Outcome::Usage | Outcome::Accepted(_) => None,
    };

    Ok(Json(CommandResponse {
        command: name,
        status: telescope.status().await,
        output,
        report,
    }))
}

#[utoipa::path(
    get,
    path = "/api/telescope/status",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Controller status", body = StatusResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "telescope"
)]
pub async fn status(
    State(state): State<AppState>,
    _operator: Operator,
) -> ApiResult<Json<StatusResponse>> {
    let tolerance = state.config.control.ready_tolerance_arcsec;
    let telescope = state.telescope.lock().await;
    Ok(Json(StatusResponse {
        status: telescope.status().await,
        control_loop_running: telescope.is_running(),
        pointing_ready: telescope.is_ready(tolerance).await,
    }))
}

#[utoipa::path(
    get,
    path = "/api/telescope/attributes",
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "All attributes in declaration order", body = Vec<AttributeSnapshot>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "telescope"
)]
pub async fn list_attributes(
    State(state): State<AppState>,
    _operator: Operator,
) -> ApiResult<Json<Vec<AttributeSnapshot>>> {
    let telescope = state.telescope.lock().await;
    Ok(Json(telescope.attributes().await))
}

#[utoipa::path(
    get,
    path = "/api/telescope/attributes/{key}",
    params(
        ("key" = String, Path, description = "Attribute key")
    ),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Attribute with history", body = AttributeSnapshot),
        (status = 404, description = "Unknown attribute", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "telescope"
)]
pub async fn get_attribute(
    State(state): State<AppState>,
    _operator: Operator,
    Path(key): Path<String>,
) -> ApiResult<Json<AttributeSnapshot>> {
    let telescope = state.telescope.lock().await;
    Ok(Json(telescope.attribute(&key).await?))
}

#[utoipa::path(
    get,
    path = "/api/telescope/ready",
    params(ReadyQuery),
    security(
        ("api_key" = [])
    ),
    responses(
        (status = 200, description = "Whether the antenna has reached the commanded position", body = ReadyResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    tag = "telescope"
)]
pub async fn ready(
    State(state): State<AppState>,
    _operator: Operator,
    Query(query): Query<ReadyQuery>,
) -> ApiResult<Json<ReadyResponse>> {
    let tolerance = query
        .tolerance_arcsec
        .unwrap_or(state.config.control.ready_tolerance_arcsec);
    let telescope = state.telescope.lock().await;
    Ok(Json(ReadyResponse {
        ready: telescope.is_ready(tolerance).await,
    }))
}
