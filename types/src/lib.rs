//! Shared wire types for the Pizzaz widget server.
//!
//! This crate contains the JSON-RPC envelopes, MCP descriptors and HTTP
//! error bodies shared between the server and its tests or clients.

/// Default port for the Pizzaz server.
pub const DEFAULT_PORT: u16 = 8000;

pub mod api;
pub mod jsonrpc;
pub mod mcp;

// Re-export commonly used types
pub use api::ErrorResponse;
pub use jsonrpc::{JsonRpcError, JsonRpcMessage, JsonRpcResponse};
pub use mcp::{
    CallToolResult, ResourceContents, ResourceDescriptor, ResourceTemplateDescriptor,
    TextContent, ToolAnnotations, ToolDescriptor, PROTOCOL_VERSION, WIDGET_MIME_TYPE,
};
