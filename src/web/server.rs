use axum::{routing::get, routing::post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::api::telescope as telescope_handlers;
use super::api_doc::ApiDoc;
use super::auth::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/telescope/command", post(telescope_handlers::command))
        .route("/api/telescope/status", get(telescope_handlers::status))
        .route(
            "/api/telescope/attributes",
            get(telescope_handlers::list_attributes),
        )
        .route(
            "/api/telescope/attributes/{key}",
            get(telescope_handlers::get_attribute),
        )
        .route("/api/telescope/ready", get(telescope_handlers::ready))
        // OpenAPI / Swagger
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(bind_addr: &str, state: AppState) -> std::io::Result<()> {
    let app = router(state);
    log::info!("Starting server on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await
}
