//! Schema catalog entries shared between the worker loop (which presents
//! tools to the model) and the Tool Dispatcher (which executes them). The
//! dispatcher contract itself lives in `swarmboard-tools`; this type is the
//! shared vocabulary both sides serialize.

use serde::{Deserialize, Serialize};

/// Describes one invocable tool: name, human description, and a JSON Schema
/// for its arguments, as surfaced to the model in a `chat(..., tools)` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_schema_roundtrips() {
        let schema = ToolSchema::new(
            "web_search",
            "search the web",
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}}}),
        );
        let json = serde_json::to_string(&schema).unwrap();
        let back: ToolSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "web_search");
        assert_eq!(back.parameters["type"], "object");
    }
}
