//! Tool dispatcher (§6.3): a thin, synchronous-looking contract the core
//! routes calls through without interpreting tool semantics.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use swarmboard_core::ToolSchema;
use tracing::{info, warn};

/// The result of invoking one tool.
#[derive(Debug, Clone)]
pub enum ToolOutcome {
    Ok { value: serde_json::Value },
    Error { kind: String, message: String },
}

impl ToolOutcome {
    pub fn ok(value: serde_json::Value) -> Self {
        Self::Ok { value }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One registered tool implementation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, params: serde_json::Value) -> ToolOutcome;
}

/// In-process registry mapping tool names to their schema and handler.
///
/// The core never interprets tool semantics, only routes by name and feeds
/// results back into the conversation.
#[derive(Default)]
pub struct ToolRegistry {
    entries: HashMap<String, (ToolSchema, Arc<dyn ToolHandler>)>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, schema: ToolSchema, handler: Arc<dyn ToolHandler>) {
        info!(tool = %schema.name, "registered tool");
        self.entries.insert(schema.name.clone(), (schema, handler));
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.entries.values().map(|(s, _)| s.clone()).collect()
    }

    pub async fn invoke(&self, tool_name: &str, params: serde_json::Value) -> ToolOutcome {
        let Some((_, handler)) = self.entries.get(tool_name) else {
            warn!(tool = tool_name, "invoked unknown tool");
            return ToolOutcome::error("unknown_tool", format!("no tool registered named '{tool_name}'"));
        };
        handler.invoke(params).await
    }

    pub fn filter_by_names(&self, names: &[String]) -> Vec<ToolSchema> {
        let allowed: std::collections::HashSet<&str> = names.iter().map(String::as_str).collect();
        self.entries
            .values()
            .filter(|(s, _)| allowed.contains(s.name.as_str()))
            .map(|(s, _)| s.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn invoke(&self, params: serde_json::Value) -> ToolOutcome {
            ToolOutcome::ok(params)
        }
    }

    fn echo_schema() -> ToolSchema {
        ToolSchema {
            name: "echo".into(),
            description: "echoes its input".into(),
            parameters: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn invoke_routes_to_the_registered_handler() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_schema(), Arc::new(Echo));

        let outcome = registry.invoke("echo", serde_json::json!({"x": 1})).await;
        match outcome {
            ToolOutcome::Ok { value } => assert_eq!(value, serde_json::json!({"x": 1})),
            other => panic!("expected Ok, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invoke_unknown_tool_returns_structured_error() {
        let registry = ToolRegistry::new();
        let outcome = registry.invoke("nope", serde_json::json!(null)).await;
        assert!(outcome.is_error());
    }

    #[test]
    fn filter_by_names_subsets_the_schema_catalog() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_schema(), Arc::new(Echo));
        registry.register(
            ToolSchema {
                name: "other".into(),
                description: "d".into(),
                parameters: serde_json::json!({}),
            },
            Arc::new(Echo),
        );

        let filtered = registry.filter_by_names(&["echo".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "echo");
    }

    #[test]
    fn schemas_lists_every_registered_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(echo_schema(), Arc::new(Echo));
        assert_eq!(registry.schemas().len(), 1);
    }
}
