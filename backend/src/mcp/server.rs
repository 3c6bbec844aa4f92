//! Per-session protocol server.
//!
//! Decodes JSON-RPC messages, dispatches them against the shared capability
//! registry and frames exactly one response envelope per request. Handler
//! failures, including panics, are turned into structured errors here and
//! never reach the transport.

use super::protocol::{Incoming, McpNotification, McpRequest, Rejected};
use crate::capabilities::CapabilityRegistry;
use crate::error::McpError;
use futures::FutureExt;
use pizzaz_types::{
    CallToolResult, JsonRpcMessage, JsonRpcResponse, ResourceDescriptor,
    ResourceTemplateDescriptor, TextContent, ToolDescriptor, PROTOCOL_VERSION,
};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Protocol server owned by one session.
#[derive(Debug)]
pub struct McpServer {
    session_id: String,
    capabilities: Arc<CapabilityRegistry>,
}

impl McpServer {
    pub fn new(session_id: impl Into<String>, capabilities: Arc<CapabilityRegistry>) -> Self {
        Self {
            session_id: session_id.into(),
            capabilities,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Handle one JSON-RPC message. Notifications produce no response.
    pub async fn handle_message(&self, message: JsonRpcMessage) -> Option<JsonRpcResponse> {
        debug!("MCP [{}]: Handling method: {}", self.session_id, message.method);

        match Incoming::decode(message) {
            Ok(Incoming::Request { id, request }) => {
                let method = request.method();
                let response = match self.dispatch(request).await {
                    Ok(result) => JsonRpcResponse::success(Some(id), result),
                    Err(e) => {
                        warn!("MCP [{}]: {} failed: {}", self.session_id, method, e);
                        error_response(Some(id), &e)
                    }
                };
                Some(response)
            }
            Ok(Incoming::Notification(notification)) => {
                match notification {
                    McpNotification::Initialized => {
                        debug!("MCP [{}]: Client initialized", self.session_id)
                    }
                    McpNotification::Cancelled { request_id } => debug!(
                        "MCP [{}]: Client cancelled request {:?}",
                        self.session_id, request_id
                    ),
                    McpNotification::Other(method) => debug!(
                        "MCP [{}]: Ignoring notification {}",
                        self.session_id, method
                    ),
                }
                None
            }
            Err(Rejected { id, error }) => {
                warn!("MCP [{}]: Rejected message: {}", self.session_id, error);
                // Undecodable notifications stay unanswered.
                id.map(|id| error_response(Some(id), &error))
            }
        }
    }

    /// Run a decoded request to completion.
    pub async fn dispatch(&self, request: McpRequest) -> Result<Value, McpError> {
        match request {
            McpRequest::Initialize { client_info } => Ok(self.initialize(client_info)),
            McpRequest::Ping => Ok(json!({})),
            McpRequest::ListTools => Ok(self.list_tools()),
            McpRequest::ListResources => Ok(self.list_resources()),
            McpRequest::ListResourceTemplates => Ok(self.list_resource_templates()),
            McpRequest::ReadResource { uri } => self.read_resource(&uri),
            McpRequest::CallTool { name, arguments } => self.call_tool(&name, arguments).await,
        }
    }

    fn initialize(&self, client_info: Option<Value>) -> Value {
        info!(
            "MCP [{}]: Initialize from {}",
            self.session_id,
            client_info
                .as_ref()
                .and_then(|c| c["name"].as_str())
                .unwrap_or("unknown client")
        );
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": { "listChanged": false },
                "resources": { "listChanged": false, "subscribe": false }
            },
            "serverInfo": {
                "name": "pizzaz",
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn list_tools(&self) -> Value {
        let tools: Vec<ToolDescriptor> = self
            .capabilities
            .tools()
            .iter()
            .map(|t| t.descriptor())
            .collect();
        json!({ "tools": tools })
    }

    fn list_resources(&self) -> Value {
        let resources: Vec<ResourceDescriptor> = self
            .capabilities
            .resources()
            .iter()
            .map(|r| r.descriptor())
            .collect();
        json!({ "resources": resources })
    }

    fn list_resource_templates(&self) -> Value {
        let templates: Vec<ResourceTemplateDescriptor> = self
            .capabilities
            .resources()
            .iter()
            .map(|r| r.template_descriptor())
            .collect();
        json!({ "resourceTemplates": templates })
    }

    fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let resource = self
            .capabilities
            .resource(uri)
            .ok_or_else(|| McpError::ResourceNotFound(uri.to_string()))?;
        Ok(json!({ "contents": [resource.contents()] }))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let tool = self
            .capabilities
            .tool(name)
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        tool.validate(&arguments)?;
        info!("MCP [{}]: Calling tool {}", self.session_id, name);

        let output = match AssertUnwindSafe(tool.invoke(arguments)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(McpError::Handler {
                    tool: name.to_string(),
                    message: e.to_string(),
                })
            }
            Err(_) => {
                error!("MCP [{}]: Tool {} panicked", self.session_id, name);
                return Err(McpError::Handler {
                    tool: name.to_string(),
                    message: "handler panicked".to_string(),
                });
            }
        };

        let result = CallToolResult {
            content: vec![TextContent::new(output.text)],
            structured_content: output.structured,
            meta: tool.result_meta(),
        };
        Ok(json!(result))
    }
}

fn error_response(id: Option<Value>, error: &McpError) -> JsonRpcResponse {
    JsonRpcResponse::error_with_data(id, error.code(), error.to_string(), error.data())
}
