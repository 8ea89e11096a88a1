//! `SubTaskSpec` (§3.3): the structured shape a planner emits when
//! decomposing work, serialized into a child task's `description`.

use crate::task::Complexity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a sub-task's result should be shaped for downstream consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Text,
    MarkdownTable,
    Json,
    Code,
    File,
}

/// Optional hint describing a delegation to an external agent-to-agent
/// collaborator. The core treats this as opaque pass-through metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct A2aHint {
    pub target: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A single unit of decomposed work, produced by a planner and consumed by
/// an executor. Round-trips through a task's free-text `description` field
/// via [`SubTaskSpec::to_description`] / [`SubTaskSpec::parse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTaskSpec {
    pub objective: String,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub input: HashMap<String, serde_json::Value>,
    pub output_format: OutputFormat,
    #[serde(default)]
    pub tool_hint: Vec<String>,
    pub complexity: Complexity,
    pub parent_intent: String,
    #[serde(default)]
    pub a2a_hint: Option<A2aHint>,
}

/// Sentinel prefix recognized by [`SubTaskSpec::parse`] for a modern,
/// JSON-encoded spec embedded in a task description.
const MODERN_PREFIX: &str = "SUBTASK_SPEC_JSON:";

impl SubTaskSpec {
    /// Serializes to the modern JSON-on-a-line format used as a task's
    /// `description`.
    pub fn to_description(&self) -> String {
        format!(
            "{MODERN_PREFIX}{}",
            serde_json::to_string(self).unwrap_or_default()
        )
    }

    /// Parses a task description back into a `SubTaskSpec`, understanding
    /// both the modern JSON format and the legacy `TASK: / COMPLEXITY:`
    /// line-oriented format emitted by older planner prompts.
    pub fn parse(description: &str, parent_intent: &str) -> Option<Self> {
        if let Some(json) = description.strip_prefix(MODERN_PREFIX) {
            return serde_json::from_str(json).ok();
        }
        Self::parse_legacy(description, parent_intent)
    }

    fn parse_legacy(description: &str, parent_intent: &str) -> Option<Self> {
        let mut objective = None;
        let mut complexity = Complexity::Normal;
        for line in description.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("TASK:") {
                objective = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("COMPLEXITY:") {
                complexity = match rest.trim().to_lowercase().as_str() {
                    "simple" => Complexity::Simple,
                    "complex" => Complexity::Complex,
                    _ => Complexity::Normal,
                };
            }
        }
        let objective = objective?;
        Some(Self {
            objective,
            constraints: Vec::new(),
            input: HashMap::new(),
            output_format: OutputFormat::Text,
            tool_hint: Vec::new(),
            complexity,
            parent_intent: parent_intent.to_string(),
            a2a_hint: None,
        })
    }

    /// Infers a task's `required_role` from keywords in the objective, per
    /// §4.7 step 3: review/audit/verify language routes to the reviewer
    /// role, everything else implements.
    pub fn infer_required_role(objective: &str) -> &'static str {
        let lower = objective.to_lowercase();
        if ["review", "audit", "verify"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            "review"
        } else {
            "implement"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modern_roundtrip() {
        let spec = SubTaskSpec {
            objective: "write the parser".into(),
            constraints: vec!["no unsafe".into()],
            input: HashMap::new(),
            output_format: OutputFormat::Code,
            tool_hint: vec!["filesystem".into()],
            complexity: Complexity::Complex,
            parent_intent: "build a CLI".into(),
            a2a_hint: None,
        };
        let desc = spec.to_description();
        let back = SubTaskSpec::parse(&desc, "ignored").unwrap();
        assert_eq!(back.objective, "write the parser");
        assert_eq!(back.complexity, Complexity::Complex);
    }

    #[test]
    fn legacy_format_parses() {
        let desc = "TASK: review the diff\nCOMPLEXITY: simple\n";
        let back = SubTaskSpec::parse(desc, "ship the feature").unwrap();
        assert_eq!(back.objective, "review the diff");
        assert_eq!(back.complexity, Complexity::Simple);
        assert_eq!(back.parent_intent, "ship the feature");
    }

    #[test]
    fn unparseable_description_returns_none() {
        assert!(SubTaskSpec::parse("just some prose", "x").is_none());
    }

    #[test]
    fn role_inference_routes_review_keywords() {
        assert_eq!(SubTaskSpec::infer_required_role("audit the output"), "review");
        assert_eq!(SubTaskSpec::infer_required_role("implement the parser"), "implement");
    }
}
