//! Built-in Pizzaz widget catalog.

use super::handler::{ToolHandler, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Declaration of one widget: a tool plus the resource that renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSpec {
    /// Tool name.
    pub id: String,
    pub title: String,
    /// URI of the widget resource, e.g. `ui://widget/pizza-map.html`.
    pub template_uri: String,
    /// Status text shown while the tool runs.
    pub invoking: String,
    /// Status text shown once the tool finished.
    pub invoked: String,
    /// Content store key of the widget markup.
    pub component: String,
    /// Text content returned by the tool.
    pub response_text: String,
}

impl WidgetSpec {
    pub fn new(
        id: &str,
        title: &str,
        component: &str,
        invoking: &str,
        invoked: &str,
        response_text: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            template_uri: format!("ui://widget/{}.html", id),
            invoking: invoking.to_string(),
            invoked: invoked.to_string(),
            component: component.to_string(),
            response_text: response_text.to_string(),
        }
    }

    /// Metadata attached to the tool, its resource and every tool result.
    pub fn meta(&self) -> Map<String, Value> {
        let mut meta = Map::new();
        meta.insert(
            "openai/outputTemplate".to_string(),
            json!(self.template_uri),
        );
        meta.insert(
            "openai/toolInvocation/invoking".to_string(),
            json!(self.invoking),
        );
        meta.insert(
            "openai/toolInvocation/invoked".to_string(),
            json!(self.invoked),
        );
        meta.insert("openai/widgetAccessible".to_string(), json!(true));
        meta.insert("openai/resultCanProduceWidget".to_string(), json!(true));
        meta
    }
}

/// The widgets served by default.
pub fn pizzaz_widgets() -> Vec<WidgetSpec> {
    vec![
        WidgetSpec::new(
            "pizza-map",
            "Show Pizza Map",
            "pizzaz",
            "Hand-tossing a map",
            "Served a fresh map",
            "Rendered a pizza map!",
        ),
        WidgetSpec::new(
            "pizza-carousel",
            "Show Pizza Carousel",
            "pizzaz-carousel",
            "Carousel some spots",
            "Served a fresh carousel",
            "Rendered a pizza carousel!",
        ),
        WidgetSpec::new(
            "pizza-albums",
            "Show Pizza Album",
            "pizzaz-albums",
            "Hand-tossing an album",
            "Served a fresh album",
            "Rendered a pizza album!",
        ),
        WidgetSpec::new(
            "pizza-list",
            "Show Pizza List",
            "pizzaz-list",
            "Hand-tossing a list",
            "Served a fresh list",
            "Rendered a pizza list!",
        ),
        WidgetSpec::new(
            "pizza-video",
            "Show Pizza Video",
            "pizzaz-video",
            "Hand-tossing a video",
            "Served a fresh video",
            "Rendered a pizza video!",
        ),
    ]
}

/// Input schema shared by all Pizzaz widgets.
pub fn pizza_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "pizzaTopping": {
                "type": "string",
                "minLength": 1,
                "description": "Topping to mention when rendering the widget."
            }
        },
        "required": ["pizzaTopping"],
        "additionalProperties": false
    })
}

/// Handler that echoes its validated arguments back as structured content.
#[derive(Debug, Clone)]
pub struct WidgetEcho {
    response_text: String,
}

impl WidgetEcho {
    pub fn new(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
        }
    }
}

#[async_trait]
impl ToolHandler for WidgetEcho {
    async fn call(&self, arguments: Value) -> anyhow::Result<ToolOutput> {
        Ok(ToolOutput {
            text: self.response_text.clone(),
            structured: arguments,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique() {
        let widgets = pizzaz_widgets();
        let ids: HashSet<_> = widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids.len(), widgets.len());
    }

    #[test]
    fn test_meta_names_template() {
        let widget = &pizzaz_widgets()[0];
        let meta = widget.meta();
        assert_eq!(
            meta["openai/outputTemplate"],
            json!("ui://widget/pizza-map.html")
        );
        assert_eq!(meta["openai/widgetAccessible"], json!(true));
    }

    #[tokio::test]
    async fn test_echo_returns_arguments() {
        let echo = WidgetEcho::new("Rendered!");
        let out = echo
            .call(json!({"pizzaTopping": "mushroom"}))
            .await
            .unwrap();
        assert_eq!(out.text, "Rendered!");
        assert_eq!(out.structured["pizzaTopping"], "mushroom");
    }
}
