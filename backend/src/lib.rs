//! Pizzaz MCP server library.
//!
//! This module exposes the application builder for use in tests.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod api;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod openapi;
pub mod state;

use state::AppState;

/// Create the Axum application router with a given state.
///
/// This function is used both by the main server binary and by integration tests.
/// The push and pull routes are mounted at the paths in the state's
/// transport settings.
pub fn create_app(state: AppState) -> Router {
    let settings = state.settings().clone();

    Router::new()
        .route("/health", get(health))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()),
        )
        .route(&settings.mcp_path, get(api::mcp::mcp_stream))
        .route(
            &settings.messages_path,
            post(api::mcp::mcp_message).delete(api::mcp::mcp_close),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    responses(
        (status = 200, description = "Server is up", body = String)
    )
)]
async fn health() -> &'static str {
    "OK"
}
