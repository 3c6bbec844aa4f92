//! Tool handler trait.

use async_trait::async_trait;
use serde_json::Value;

/// What a tool produced: a human-readable text plus structured content.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub structured: Value,
}

/// Executes a tool after its arguments passed schema validation.
///
/// Handlers may have side effects. Returned errors and panics are caught by
/// the dispatcher and reported to the caller as structured errors.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> anyhow::Result<ToolOutput>;
}
