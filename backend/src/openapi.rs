//! OpenAPI documentation configuration.

use pizzaz_types::{ErrorResponse, JsonRpcMessage};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::health,
        crate::api::mcp::mcp_stream,
        crate::api::mcp::mcp_message,
        crate::api::mcp::mcp_close,
    ),
    components(schemas(ErrorResponse, JsonRpcMessage)),
    tags(
        (name = "mcp", description = "MCP push (SSE) and pull (POST) channels"),
        (name = "System", description = "Liveness endpoints")
    ),
    info(
        title = "Pizzaz MCP Server",
        description = "Model Context Protocol server exposing the Pizzaz widget tools over SSE",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
