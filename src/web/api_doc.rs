use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::telescope::{CommandResponse, ReadyResponse, StatusResponse};

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::telescope::command,
        super::api::telescope::status,
        super::api::telescope::list_attributes,
        super::api::telescope::get_attribute,
        super::api::telescope::ready,
    ),
    components(
        schemas(
            CommandResponse,
            StatusResponse,
            ReadyResponse,
            ErrorResponse,
            crate::telescope::TelescopeStatus,
            crate::telescope::TelescopeReport,
            crate::attribute::AttributeSnapshot,
            crate::acu::HardwareStatus,
            crate::acu::NormalStatus,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Antenna TCS API",
        description = "Remote command and telemetry interface of the antenna controller",
        version = "0.1.0"
    ),
    tags(
        (name = "telescope", description = "Antenna commands and telemetry")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}
