//! MCP result payloads carried inside JSON-RPC responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MIME type of widget markup understood by the Apps SDK host.
pub const WIDGET_MIME_TYPE: &str = "text/html+skybridge";

/// Tool behavior hints advertised to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolAnnotations {
    pub destructive_hint: bool,
    pub open_world_hint: bool,
    pub read_only_hint: bool,
}

impl Default for ToolAnnotations {
    fn default() -> Self {
        Self {
            destructive_hint: false,
            open_world_hint: false,
            read_only_hint: true,
        }
    }
}

/// Entry of a `tools/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
}

/// Entry of a `resources/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
}

/// Entry of a `resources/templates/list` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTemplateDescriptor {
    pub uri_template: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
}

/// One item of a `resources/read` result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContents {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
}

/// Text content block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
        }
    }
}

/// Result of a successful `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    pub content: Vec<TextContent>,
    pub structured_content: Value,
    #[serde(rename = "_meta")]
    pub meta: Map<String, Value>,
}
