//! Decoding of JSON-RPC messages into MCP method kinds.

use crate::error::McpError;
use pizzaz_types::jsonrpc::JSONRPC_VERSION;
use pizzaz_types::JsonRpcMessage;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// A request the dispatcher answers.
#[derive(Debug, Clone, PartialEq)]
pub enum McpRequest {
    Initialize { client_info: Option<Value> },
    Ping,
    ListTools,
    ListResources,
    ListResourceTemplates,
    ReadResource { uri: String },
    CallTool { name: String, arguments: Value },
}

/// A notification: accepted, never answered.
#[derive(Debug, Clone, PartialEq)]
pub enum McpNotification {
    Initialized,
    Cancelled { request_id: Option<Value> },
    Other(String),
}

/// A decoded incoming message.
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Request { id: Value, request: McpRequest },
    Notification(McpNotification),
}

/// A message that could not be decoded, with the id to answer to.
#[derive(Debug)]
pub struct Rejected {
    pub id: Option<Value>,
    pub error: McpError,
}

#[derive(Deserialize)]
struct ReadResourceParams {
    uri: String,
}

#[derive(Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    #[serde(default)]
    client_info: Option<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelledParams {
    #[serde(default)]
    request_id: Option<Value>,
}

fn params<T: DeserializeOwned>(method: &str, params: Option<Value>) -> Result<T, McpError> {
    let params = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(params)
        .map_err(|e| McpError::InvalidParams(format!("{}: {}", method, e)))
}

impl McpRequest {
    /// Decode a request from its method name and params.
    pub fn parse(method: &str, raw: Option<Value>) -> Result<Self, McpError> {
        let request = match method {
            "initialize" => {
                let p: InitializeParams = params(method, raw)?;
                McpRequest::Initialize {
                    client_info: p.client_info,
                }
            }
            "ping" => McpRequest::Ping,
            "tools/list" => McpRequest::ListTools,
            "resources/list" => McpRequest::ListResources,
            "resources/templates/list" => McpRequest::ListResourceTemplates,
            "resources/read" => {
                let p: ReadResourceParams = params(method, raw)?;
                McpRequest::ReadResource { uri: p.uri }
            }
            "tools/call" => {
                let p: CallToolParams = params(method, raw)?;
                McpRequest::CallTool {
                    name: p.name,
                    arguments: p.arguments.unwrap_or_else(|| json!({})),
                }
            }
            other => return Err(McpError::MethodNotFound(other.to_string())),
        };
        Ok(request)
    }

    /// Method name, for logging.
    pub fn method(&self) -> &'static str {
        match self {
            McpRequest::Initialize { .. } => "initialize",
            McpRequest::Ping => "ping",
            McpRequest::ListTools => "tools/list",
            McpRequest::ListResources => "resources/list",
            McpRequest::ListResourceTemplates => "resources/templates/list",
            McpRequest::ReadResource { .. } => "resources/read",
            McpRequest::CallTool { .. } => "tools/call",
        }
    }
}

impl McpNotification {
    fn parse(method: &str, raw: Option<Value>) -> Self {
        match method {
            "notifications/initialized" | "initialized" => McpNotification::Initialized,
            "notifications/cancelled" => {
                let request_id = params::<CancelledParams>(method, raw)
                    .ok()
                    .and_then(|p| p.request_id);
                McpNotification::Cancelled { request_id }
            }
            other => McpNotification::Other(other.to_string()),
        }
    }
}

impl Incoming {
    /// Decode a JSON-RPC message.
    pub fn decode(message: JsonRpcMessage) -> Result<Self, Rejected> {
        if message.jsonrpc != JSONRPC_VERSION {
            return Err(Rejected {
                id: message.id,
                error: McpError::InvalidRequest(format!(
                    "unsupported jsonrpc version {:?}",
                    message.jsonrpc
                )),
            });
        }

        match message.id {
            Some(Value::Null) => Err(Rejected {
                id: Some(Value::Null),
                error: McpError::InvalidRequest("request id must not be null".to_string()),
            }),
            Some(id) => match McpRequest::parse(&message.method, message.params) {
                Ok(request) => Ok(Incoming::Request { id, request }),
                Err(error) => Err(Rejected {
                    id: Some(id),
                    error,
                }),
            },
            None => Ok(Incoming::Notification(McpNotification::parse(
                &message.method,
                message.params,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(value: Value) -> JsonRpcMessage {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_decode_call_tool() {
        let incoming = Incoming::decode(msg(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "pizza-map", "arguments": {"pizzaTopping": "pepperoni"}}
        })))
        .unwrap();

        assert_eq!(
            incoming,
            Incoming::Request {
                id: json!(3),
                request: McpRequest::CallTool {
                    name: "pizza-map".to_string(),
                    arguments: json!({"pizzaTopping": "pepperoni"}),
                },
            }
        );
    }

    #[test]
    fn test_call_tool_defaults_arguments() {
        let request = McpRequest::parse("tools/call", Some(json!({"name": "pizza-list"}))).unwrap();
        assert_eq!(
            request,
            McpRequest::CallTool {
                name: "pizza-list".to_string(),
                arguments: json!({}),
            }
        );
    }

    #[test]
    fn test_read_resource_requires_uri() {
        let err = McpRequest::parse("resources/read", None).unwrap_err();
        assert!(matches!(err, McpError::InvalidParams(_)));
    }

    #[test]
    fn test_unknown_method_keeps_id() {
        let rejected = Incoming::decode(msg(json!({
            "jsonrpc": "2.0",
            "id": "abc",
            "method": "prompts/list"
        })))
        .unwrap_err();
        assert_eq!(rejected.id, Some(json!("abc")));
        assert!(matches!(rejected.error, McpError::MethodNotFound(m) if m == "prompts/list"));
    }

    #[test]
    fn test_null_id_rejected() {
        let rejected = Incoming::decode(msg(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "ping"
        })))
        .unwrap_err();
        assert_eq!(rejected.id, Some(Value::Null));
        assert!(matches!(rejected.error, McpError::InvalidRequest(_)));
    }

    #[test]
    fn test_notifications() {
        let incoming = Incoming::decode(msg(json!({
            "jsonrpc": "2.0",
            "method": "notifications/cancelled",
            "params": {"requestId": 9, "reason": "user"}
        })))
        .unwrap();
        assert_eq!(
            incoming,
            Incoming::Notification(McpNotification::Cancelled {
                request_id: Some(json!(9))
            })
        );
    }

    #[test]
    fn test_wrong_version_rejected() {
        let rejected = Incoming::decode(msg(json!({
            "jsonrpc": "1.0",
            "id": 1,
            "method": "ping"
        })))
        .unwrap_err();
        assert!(matches!(rejected.error, McpError::InvalidRequest(_)));
    }
}
