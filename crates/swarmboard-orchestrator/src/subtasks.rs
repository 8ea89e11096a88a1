//! Sub-task extraction and the parent → children registry (§4.7 step 2-4):
//! turns a planner's free-text result into at most three [`SubTaskSpec`]s
//! and remembers which children belong to which parent for close-out.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use swarmboard_board::io::{read_or_default, write_atomic};
use swarmboard_board::lock::{sibling_lock_path, ExclusiveLock};
use swarmboard_core::{SubTaskSpec, SwarmResult};

const MAX_SUBTASKS: usize = 3;

/// Scans a planner's result text for sub-task blocks, understanding both
/// the modern one-line-per-spec JSON format and the legacy `TASK:` /
/// `COMPLEXITY:` block format. Blank or unparseable blocks are skipped.
pub fn extract_specs(planner_result: &str, parent_intent: &str) -> Vec<SubTaskSpec> {
    let modern: Vec<SubTaskSpec> = planner_result
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with("SUBTASK_SPEC_JSON:"))
        .filter_map(|line| SubTaskSpec::parse(line, parent_intent))
        .collect();
    if !modern.is_empty() {
        return modern;
    }

    legacy_blocks(planner_result)
        .iter()
        .filter_map(|block| SubTaskSpec::parse(block, parent_intent))
        .collect()
}

/// Splits `text` into blocks, each starting at a line beginning with
/// `TASK:` and running until the next such line.
fn legacy_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim_start().starts_with("TASK:") && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() || line.trim_start().starts_with("TASK:") {
            current.push_str(line);
            current.push('\n');
        }
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

/// Caps `specs` at [`MAX_SUBTASKS`], merging any excess into a
/// `MERGE_NOTE` constraint recorded on the first sub-task per §4.7 step 2.
pub fn cap_at_three(mut specs: Vec<SubTaskSpec>) -> Vec<SubTaskSpec> {
    if specs.len() <= MAX_SUBTASKS {
        return specs;
    }
    let overflow = specs.split_off(MAX_SUBTASKS);
    let summary = overflow
        .iter()
        .map(|s| s.objective.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    if let Some(first) = specs.first_mut() {
        first
            .constraints
            .push(format!("MERGE_NOTE: folded {} extra sub-task(s): {summary}", overflow.len()));
    }
    specs
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct RegistryDocument {
    /// parent task id -> ordered child task ids.
    children: HashMap<String, Vec<String>>,
}

/// File-backed parent → children mapping, persisted the same way the Task
/// Board persists its own document: exclusive sibling lock, read-or-
/// default, write-to-temp-then-rename.
#[derive(Clone)]
pub struct SubtaskRegistry {
    path: Arc<PathBuf>,
}

impl SubtaskRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    pub async fn record(&self, parent_id: impl Into<String>, child_ids: Vec<String>) -> SwarmResult<()> {
        let parent_id = parent_id.into();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc: RegistryDocument = read_or_default(&path)?;
            doc.children.insert(parent_id, child_ids);
            write_atomic(&path, &doc)
        })
        .await
        .expect("subtask registry record task panicked")
    }

    pub async fn children_of(&self, parent_id: &str) -> SwarmResult<Vec<String>> {
        let path = self.path.clone();
        let parent_id = parent_id.to_string();
        tokio::task::spawn_blocking(move || {
            let doc: RegistryDocument = read_or_default(&path)?;
            Ok(doc.children.get(&parent_id).cloned().unwrap_or_default())
        })
        .await
        .expect("subtask registry children_of task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmboard_core::{Complexity, OutputFormat};

    #[test]
    fn extracts_multiple_modern_specs() {
        let spec_a = SubTaskSpec {
            objective: "write the parser".into(),
            constraints: vec![],
            input: HashMap::new(),
            output_format: OutputFormat::Code,
            tool_hint: vec![],
            complexity: Complexity::Normal,
            parent_intent: "build a CLI".into(),
            a2a_hint: None,
        };
        let spec_b = SubTaskSpec {
            objective: "review the parser".into(),
            constraints: vec![],
            input: HashMap::new(),
            output_format: OutputFormat::Text,
            tool_hint: vec![],
            complexity: Complexity::Simple,
            parent_intent: "build a CLI".into(),
            a2a_hint: None,
        };
        let planner_result = format!("Here is my plan:\n{}\n{}\nDone.", spec_a.to_description(), spec_b.to_description());
        let extracted = extract_specs(&planner_result, "build a CLI");
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].objective, "write the parser");
        assert_eq!(extracted[1].objective, "review the parser");
    }

    #[test]
    fn extracts_legacy_blocks() {
        let planner_result = "\
TASK: write the parser
COMPLEXITY: normal

TASK: review the parser
COMPLEXITY: simple
";
        let extracted = extract_specs(planner_result, "build a CLI");
        assert_eq!(extracted.len(), 2);
        assert_eq!(extracted[0].objective, "write the parser");
        assert_eq!(extracted[1].complexity, Complexity::Simple);
    }

    #[test]
    fn caps_at_three_with_merge_note_on_first() {
        let make = |n: usize| SubTaskSpec {
            objective: format!("task {n}"),
            constraints: vec![],
            input: HashMap::new(),
            output_format: OutputFormat::Text,
            tool_hint: vec![],
            complexity: Complexity::Normal,
            parent_intent: "x".into(),
            a2a_hint: None,
        };
        let specs = (0..5).map(make).collect::<Vec<_>>();
        let capped = cap_at_three(specs);
        assert_eq!(capped.len(), 3);
        assert!(capped[0].constraints.iter().any(|c| c.starts_with("MERGE_NOTE:")));
    }

    #[test]
    fn unparseable_result_extracts_nothing() {
        assert!(extract_specs("just some prose with no structure", "x").is_empty());
    }

    #[tokio::test]
    async fn registry_roundtrips_children() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SubtaskRegistry::new(dir.path().join("subtasks.json"));
        registry.record("p1", vec!["p1-a".into(), "p1-b".into()]).await.unwrap();
        let children = registry.children_of("p1").await.unwrap();
        assert_eq!(children, vec!["p1-a".to_string(), "p1-b".to_string()]);
        assert!(registry.children_of("nonexistent").await.unwrap().is_empty());
    }
}
