//! Capability registry: the tools and resources served to every session.
//!
//! The registry is built exactly once, before the server binds its
//! listener, and is shared read-only (behind an `Arc`) by all sessions.
//! Lookups by tool name and resource URI go through hash indexes; the
//! declaration order is kept for listing.

pub mod handler;
pub mod store;
pub mod widgets;

pub use handler::{ToolHandler, ToolOutput};
pub use store::{AssetDir, ContentStore, MemoryStore};
pub use widgets::{pizza_input_schema, pizzaz_widgets, WidgetEcho, WidgetSpec};

use crate::error::{McpError, StartupError};
use pizzaz_types::{
    ResourceContents, ResourceDescriptor, ResourceTemplateDescriptor, ToolAnnotations,
    ToolDescriptor, WIDGET_MIME_TYPE,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Metadata key carrying inline widget markup in tool results.
pub const EMBEDDED_WIDGET_KEY: &str = "openai.com/widget";

/// How a tool result refers to the widget that renders it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum WidgetDelivery {
    /// Only the template URI is returned; clients read the resource.
    #[default]
    Reference,
    /// The widget markup is embedded in every tool result.
    Inline,
}

/// A named action with a declared input schema.
pub struct Tool {
    pub name: String,
    pub title: String,
    pub description: String,
    pub input_schema: Value,
    pub annotations: ToolAnnotations,
    /// Response-metadata template, copied into every result.
    pub meta: Map<String, Value>,
    embedded_widget: Option<Value>,
    validator: jsonschema::Validator,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a tool, compiling its input schema.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        input_schema: Value,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, StartupError> {
        let name = name.into();
        let title = title.into();
        let validator =
            jsonschema::validator_for(&input_schema).map_err(|e| StartupError::InvalidSchema {
                tool: name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            description: title.clone(),
            name,
            title,
            input_schema,
            annotations: ToolAnnotations::default(),
            meta: Map::new(),
            embedded_widget: None,
            validator,
            handler,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_annotations(mut self, annotations: ToolAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Check `arguments` against the input schema.
    pub fn validate(&self, arguments: &Value) -> Result<(), McpError> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(McpError::Validation {
                tool: self.name.clone(),
                errors,
            })
        }
    }

    /// Run the handler. Callers validate first.
    pub async fn invoke(&self, arguments: Value) -> anyhow::Result<ToolOutput> {
        self.handler.call(arguments).await
    }

    /// Metadata for a tool result, including inline markup when configured.
    pub fn result_meta(&self) -> Map<String, Value> {
        let mut meta = self.meta.clone();
        if let Some(widget) = &self.embedded_widget {
            meta.insert(EMBEDDED_WIDGET_KEY.to_string(), widget.clone());
        }
        meta
    }

    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            annotations: self.annotations.clone(),
            meta: self.meta.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("title", &self.title)
            .field("inline_widget", &self.embedded_widget.is_some())
            .finish_non_exhaustive()
    }
}

/// Named content, served verbatim.
#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub mime_type: String,
    pub text: Arc<str>,
    pub meta: Map<String, Value>,
}

impl Resource {
    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptor {
            uri: self.uri.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            meta: self.meta.clone(),
        }
    }

    pub fn template_descriptor(&self) -> ResourceTemplateDescriptor {
        ResourceTemplateDescriptor {
            uri_template: self.uri.clone(),
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            meta: self.meta.clone(),
        }
    }

    pub fn contents(&self) -> ResourceContents {
        ResourceContents {
            uri: self.uri.clone(),
            mime_type: self.mime_type.clone(),
            text: self.text.to_string(),
            meta: self.meta.clone(),
        }
    }

    /// Embedded-resource form used for inline widget delivery.
    fn embedded(&self) -> Value {
        json!({
            "type": "resource",
            "resource": {
                "uri": self.uri,
                "mimeType": self.mime_type,
                "text": &*self.text,
                "title": self.title,
            }
        })
    }
}

/// Builder collecting capabilities before the registry is frozen.
pub struct RegistryBuilder {
    delivery: WidgetDelivery,
    tools: Vec<Tool>,
    resources: Vec<Resource>,
}

impl RegistryBuilder {
    pub fn new(delivery: WidgetDelivery) -> Self {
        Self {
            delivery,
            tools: Vec::new(),
            resources: Vec::new(),
        }
    }

    /// Add a widget served by the echo handler.
    pub fn widget(
        self,
        spec: &WidgetSpec,
        store: &dyn ContentStore,
    ) -> Result<Self, StartupError> {
        let handler = Arc::new(WidgetEcho::new(spec.response_text.clone()));
        self.widget_with_handler(spec, store, handler)
    }

    /// Add a widget whose tool runs `handler`.
    pub fn widget_with_handler(
        mut self,
        spec: &WidgetSpec,
        store: &dyn ContentStore,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<Self, StartupError> {
        let markup = store
            .load(&spec.component)?
            .ok_or_else(|| StartupError::MissingContent {
                capability: spec.id.clone(),
                component: spec.component.clone(),
                location: store.location(),
            })?;

        let meta = spec.meta();
        let resource = Resource {
            uri: spec.template_uri.clone(),
            name: spec.title.clone(),
            title: spec.title.clone(),
            description: format!("{} widget markup", spec.title),
            mime_type: WIDGET_MIME_TYPE.to_string(),
            text: Arc::from(markup),
            meta: meta.clone(),
        };

        let mut tool = Tool::new(&spec.id, &spec.title, pizza_input_schema(), handler)?
            .with_meta(meta);
        if self.delivery == WidgetDelivery::Inline {
            tool.embedded_widget = Some(resource.embedded());
        }

        debug!("Declared widget {} ({})", spec.id, spec.template_uri);
        self.tools.push(tool);
        self.resources.push(resource);
        Ok(self)
    }

    pub fn tool(mut self, tool: Tool) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// Freeze the registry, rejecting duplicate names and URIs.
    pub fn build(self) -> Result<CapabilityRegistry, StartupError> {
        let mut tool_index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if tool_index.insert(tool.name.clone(), i).is_some() {
                return Err(StartupError::DuplicateTool(tool.name.clone()));
            }
        }

        let mut resource_index = HashMap::with_capacity(self.resources.len());
        for (i, resource) in self.resources.iter().enumerate() {
            if resource_index.insert(resource.uri.clone(), i).is_some() {
                return Err(StartupError::DuplicateResource(resource.uri.clone()));
            }
        }

        Ok(CapabilityRegistry {
            tools: self.tools,
            tool_index,
            resources: self.resources,
            resource_index,
        })
    }
}

/// Immutable set of tools and resources.
#[derive(Debug)]
pub struct CapabilityRegistry {
    tools: Vec<Tool>,
    tool_index: HashMap<String, usize>,
    resources: Vec<Resource>,
    resource_index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn builder(delivery: WidgetDelivery) -> RegistryBuilder {
        RegistryBuilder::new(delivery)
    }

    /// Build the registry for the built-in widget catalog.
    ///
    /// Fails if any widget's markup is missing from `store`.
    pub fn load(
        store: &dyn ContentStore,
        delivery: WidgetDelivery,
    ) -> Result<Self, StartupError> {
        let mut builder = Self::builder(delivery);
        for spec in pizzaz_widgets() {
            builder = builder.widget(&spec, store)?;
        }
        let registry = builder.build()?;
        info!(
            "Capability registry ready: {} tools, {} resources ({:?} widget delivery) from {}",
            registry.tools.len(),
            registry.resources.len(),
            delivery,
            store.location()
        );
        Ok(registry)
    }

    pub fn tool(&self, name: &str) -> Option<&Tool> {
        self.tool_index.get(name).map(|&i| &self.tools[i])
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resource_index.get(uri).map(|&i| &self.resources[i])
    }

    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }
}
