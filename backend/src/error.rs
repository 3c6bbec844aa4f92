//! Error types for registry construction, dispatch and transport.

use pizzaz_types::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, RESOURCE_NOT_FOUND,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while building the capability registry.
///
/// None of these are recoverable: the server must not accept sessions
/// when registry construction fails.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Widget assets not found. Expected directory {}", dir.display())]
    AssetsDirMissing { dir: PathBuf },

    #[error("Widget HTML for \"{component}\" (capability {capability}) not found in {location}")]
    MissingContent {
        capability: String,
        component: String,
        location: String,
    },

    #[error("Failed to read widget content from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid input schema for tool {tool}: {reason}")]
    InvalidSchema { tool: String, reason: String },

    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Duplicate resource URI: {0}")]
    DuplicateResource(String),
}

/// Errors surfaced to callers as structured JSON-RPC error envelopes.
///
/// A dispatch error never closes the session it happened on.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Invalid arguments for tool {tool}: {}", .errors.join("; "))]
    Validation { tool: String, errors: Vec<String> },

    #[error("Unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Unknown resource: {0}")]
    ResourceNotFound(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Tool {tool} failed: {message}")]
    Handler { tool: String, message: String },
}

impl McpError {
    /// JSON-RPC error code for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::Validation { .. } | McpError::InvalidParams(_) => INVALID_PARAMS,
            McpError::ToolNotFound(_) | McpError::ResourceNotFound(_) => RESOURCE_NOT_FOUND,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::Handler { .. } => INTERNAL_ERROR,
        }
    }

    /// Short taxonomy name, carried in `error.data.kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            McpError::Validation { .. } => "validation",
            McpError::ToolNotFound(_) | McpError::ResourceNotFound(_) => "not_found",
            McpError::MethodNotFound(_) => "method_not_found",
            McpError::InvalidParams(_) => "invalid_params",
            McpError::InvalidRequest(_) => "invalid_request",
            McpError::Handler { .. } => "internal",
        }
    }

    /// Structured `error.data` payload.
    pub fn data(&self) -> Value {
        match self {
            McpError::Validation { tool, errors } => {
                json!({ "kind": self.kind(), "tool": tool, "errors": errors })
            }
            McpError::ToolNotFound(name) => json!({ "kind": self.kind(), "tool": name }),
            McpError::ResourceNotFound(uri) => json!({ "kind": self.kind(), "uri": uri }),
            McpError::Handler { tool, .. } => json!({ "kind": self.kind(), "tool": tool }),
            _ => json!({ "kind": self.kind() }),
        }
    }
}

/// Push-channel delivery failure. Fatal for the affected session only.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Push channel for session {0} is closed")]
    ChannelClosed(String),

    #[error("Failed to encode response for session {0}: {1}")]
    Encode(String, #[source] serde_json::Error),
}

impl TransportError {
    /// Whether the session's push channel is unusable from now on.
    pub fn closes_session(&self) -> bool {
        matches!(self, TransportError::ChannelClosed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_content_names_capability_and_location() {
        let err = StartupError::MissingContent {
            capability: "pizza-map".to_string(),
            component: "pizzaz".to_string(),
            location: "/srv/assets".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("pizza-map"));
        assert!(msg.contains("/srv/assets"));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::ToolNotFound("x".into()).code(), RESOURCE_NOT_FOUND);
        assert_eq!(
            McpError::Validation {
                tool: "x".into(),
                errors: vec![]
            }
            .code(),
            INVALID_PARAMS
        );
        assert_eq!(McpError::MethodNotFound("x".into()).kind(), "method_not_found");
    }

    #[test]
    fn test_invalid_request_has_own_kind() {
        let err = McpError::InvalidRequest("unsupported jsonrpc version".into());
        assert_eq!(err.code(), INVALID_REQUEST);
        assert_eq!(err.kind(), "invalid_request");
        assert_eq!(err.data()["kind"], "invalid_request");
        assert_eq!(McpError::InvalidParams("x".into()).kind(), "invalid_params");
    }

    #[test]
    fn test_encode_failure_keeps_session() {
        let cause = serde_json::from_str::<Value>("{").unwrap_err();
        let err = TransportError::Encode("abc".into(), cause);
        assert!(!err.closes_session());
        assert!(err.to_string().contains("abc"));
        assert!(TransportError::ChannelClosed("abc".into()).closes_session());
    }
}
