//! Planner close-out (§4.7): the [`TaskPostProcessor`] implementation the
//! orchestrator hands to every `planner`-role [`AgentWorker`], covering
//! both halves of the contract — decomposing a planner's result into
//! sub-tasks, and synthesizing a parent's final result once every
//! sub-task has settled.

use async_trait::async_trait;
use std::sync::Arc;
use swarmboard_agent::{ProviderRouter, ProviderResponse};
use swarmboard_board::Board;
use swarmboard_bus::WakeupBus;
use swarmboard_core::{Complexity, Message, SwarmError, SwarmResult, Task, TaskStatus};
use swarmboard_tools::{ToolOutcome, ToolRegistry};
use tracing::{info, warn};

use crate::subtasks::{cap_at_three, extract_specs, SubtaskRegistry};

const MAX_SYNTHESIS_ROUNDS: u32 = 3;

pub struct SynthesisProcessor {
    board: Board,
    registry: SubtaskRegistry,
    wakeup: WakeupBus,
    router: Arc<ProviderRouter>,
    tools: Arc<ToolRegistry>,
}

impl SynthesisProcessor {
    pub fn new(
        board: Board,
        registry: SubtaskRegistry,
        wakeup: WakeupBus,
        router: Arc<ProviderRouter>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self { board, registry, wakeup, router, tools }
    }

    async fn settle_parent_if_ready(&self, parent_id: &str) -> SwarmResult<()> {
        let child_ids = self.registry.children_of(parent_id).await?;
        if child_ids.is_empty() {
            return Ok(());
        }

        let mut children = Vec::with_capacity(child_ids.len());
        for id in &child_ids {
            let Some(child) = self.board.get(id).await? else {
                return Ok(());
            };
            children.push(child);
        }

        if children.iter().any(|c| !c.status.is_terminal()) {
            return Ok(());
        }

        let Some(parent) = self.board.get(parent_id).await? else {
            return Ok(());
        };
        if parent.status != TaskStatus::Claimed {
            return Ok(());
        }

        if children.iter().any(|c| c.status == TaskStatus::Failed) {
            warn!(parent_id, "a sub-task failed, failing the parent");
            self.board
                .fail(parent_id.to_string(), "one or more sub-tasks failed")
                .await?;
            return Ok(());
        }

        self.board.begin_synthesis(parent_id.to_string()).await?;
        let prompt = build_closeout_prompt(&parent, &children);
        let result = self.run_synthesis_loop(&parent, prompt).await?;
        self.board.complete(parent_id.to_string(), Some(result)).await?;
        self.wakeup.notify().await;
        info!(parent_id, "planner close-out complete");
        Ok(())
    }

    async fn run_synthesis_loop(&self, parent: &Task, prompt: String) -> SwarmResult<String> {
        let tools = self.tools.schemas();
        let mut messages = vec![Message::user(prompt, parent.id.clone())];

        for _ in 0..MAX_SYNTHESIS_ROUNDS {
            let response = self.router.chat(None, &messages, &tools).await?;
            match response {
                ProviderResponse::Done(text) | ProviderResponse::Text(text) => return Ok(text),
                ProviderResponse::ToolUse { content, tool_calls } => {
                    if let Some(text) = content {
                        messages.push(Message::assistant(text, parent.id.clone()));
                    }
                    for call in tool_calls {
                        let outcome = self.tools.invoke(&call.name, call.arguments).await;
                        let payload = match outcome {
                            ToolOutcome::Ok { value } => {
                                serde_json::json!({"tool_use_id": call.id, "content": value, "is_error": false})
                            }
                            ToolOutcome::Error { kind, message } => {
                                serde_json::json!({"tool_use_id": call.id, "content": message, "is_error": true, "kind": kind})
                            }
                        };
                        messages.push(Message::tool(payload.to_string(), parent.id.clone()));
                    }
                }
            }
        }

        Err(SwarmError::Orchestrator(format!(
            "synthesis for '{}' exceeded {MAX_SYNTHESIS_ROUNDS} tool rounds",
            parent.id
        )))
    }
}

#[async_trait]
impl swarmboard_agent::TaskPostProcessor for SynthesisProcessor {
    async fn decompose(&self, task: &Task, result: &str) -> SwarmResult<()> {
        let specs = cap_at_three(extract_specs(result, &task.description));
        if specs.is_empty() {
            warn!(task_id = %task.id, "planner result had no parseable sub-tasks, completing directly");
            self.board.complete(task.id.clone(), Some(result.to_string())).await?;
            return Ok(());
        }

        let mut child_ids = Vec::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            let child_id = format!("{}-{}", task.id, (b'a' + i as u8) as char);
            let role = swarmboard_core::SubTaskSpec::infer_required_role(&spec.objective).to_string();
            let child = Task::child_of(
                task,
                child_id.clone(),
                spec.to_description(),
                Some(role),
                spec.complexity,
                Default::default(),
            );
            self.board.create(child).await?;
            child_ids.push(child_id);
        }

        self.registry.record(task.id.clone(), child_ids).await?;
        self.wakeup.notify().await;
        info!(task_id = %task.id, subtasks = specs.len(), "planner decomposed into sub-tasks");
        Ok(())
    }

    async fn on_task_settled(&self, task_id: &str) -> SwarmResult<()> {
        let Some(task) = self.board.get(task_id).await? else {
            return Ok(());
        };
        let Some(parent_id) = task.parent_id else {
            return Ok(());
        };
        self.settle_parent_if_ready(&parent_id).await
    }
}

/// Builds the prompt handed to the planner's close-out call: the original
/// request, every sub-task's attributed result, and any critique items
/// raised against them.
fn build_closeout_prompt(parent: &Task, children: &[Task]) -> String {
    let mut prompt = format!(
        "Original request: {}\n\nSub-task results:\n",
        parent.source.original_text
    );
    for (i, child) in children.iter().enumerate() {
        prompt.push_str(&format!(
            "--- Sub-task {} (agent: {}) ---\n{}\n",
            i + 1,
            child.agent_id.as_deref().unwrap_or("unknown"),
            child.result.as_deref().unwrap_or("(no result)"),
        ));
        if let Some(critique) = &child.critique {
            if !critique.items.is_empty() {
                prompt.push_str("Critique items raised during review:\n");
                for item in &critique.items {
                    prompt.push_str(&format!("- [{}] {}\n", item.dimension, item.note));
                }
            }
        }
    }
    prompt.push_str(
        "\nSynthesize one coherent final answer for the original requester, incorporating every \
         sub-task result above and noting any file deliverables.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as at;
    use std::sync::Mutex;
    use swarmboard_agent::{CallStats, ModelProvider, ProviderEntry, SelectionStrategy, TaskPostProcessor};
    use swarmboard_bus::MailboxHub;
    use swarmboard_core::{Source, ToolSchema};

    struct ScriptedProvider {
        turns: Mutex<Vec<ProviderResponse>>,
    }

    #[at]
    impl ModelProvider for ScriptedProvider {
        async fn chat(
            &self,
            _model: &str,
            _api_key: Option<&str>,
            _system_prompt: Option<&str>,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> SwarmResult<(ProviderResponse, CallStats)> {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                return Err(SwarmError::Provider("scripted provider exhausted".into()));
            }
            Ok((turns.remove(0), CallStats::default()))
        }
    }

    fn router_with(turns: Vec<ProviderResponse>) -> Arc<ProviderRouter> {
        let provider = ScriptedProvider { turns: Mutex::new(turns) };
        let entry = ProviderEntry::new("scripted", Box::new(provider), vec!["m1".into()], 0, 0.0);
        Arc::new(ProviderRouter::new(vec![entry], SelectionStrategy::Preference))
    }

    fn processor(dir: &std::path::Path, router: Arc<ProviderRouter>) -> SynthesisProcessor {
        let board = Board::new(dir.join("task_board.json"));
        let registry = SubtaskRegistry::new(dir.join("subtasks.json"));
        let wakeup = WakeupBus::new(dir.join("task_signals"));
        let tools = Arc::new(ToolRegistry::new());
        SynthesisProcessor::new(board, registry, wakeup, router, tools)
    }

    #[tokio::test]
    async fn decompose_creates_children_and_records_registry() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(dir.path(), router_with(vec![]));
        let parent = Task::new_root("p", "build a widget", Some("planner".into()), Complexity::Normal, Source::new("build a widget"));
        proc.board.create(parent.clone()).await.unwrap();

        let result = "TASK: implement the widget\nCOMPLEXITY: normal\n\nTASK: review the widget\nCOMPLEXITY: simple\n";
        proc.decompose(&parent, result).await.unwrap();

        let children = proc.registry.children_of("p").await.unwrap();
        assert_eq!(children.len(), 2);
        let c0 = proc.board.get(&children[0]).await.unwrap().unwrap();
        assert_eq!(c0.required_role.as_deref(), Some("implement"));
        let c1 = proc.board.get(&children[1]).await.unwrap().unwrap();
        assert_eq!(c1.required_role.as_deref(), Some("review"));
    }

    #[tokio::test]
    async fn unparseable_planner_result_completes_parent_directly() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(dir.path(), router_with(vec![]));
        let parent = Task::new_root("p", "answer a quick question", Some("planner".into()), Complexity::Normal, Source::new("x"));
        proc.board.create(parent.clone()).await.unwrap();
        proc.board.claim("p", "planner-1", "planner", 0).await.unwrap();

        proc.decompose(&parent, "just some prose with no structure").await.unwrap();

        let task = proc.board.get("p").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn settle_parent_waits_until_every_child_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(dir.path(), router_with(vec![ProviderResponse::Done("final answer".into())]));

        let parent = Task::new_root("p", "build a widget", Some("planner".into()), Complexity::Normal, Source::new("build a widget"));
        proc.board.create(parent.clone()).await.unwrap();
        proc.board.claim("p", "planner-1", "planner", 0).await.unwrap();

        let child_a = Task::child_of(&parent, "p-a", "do a", Some("implement".into()), Complexity::Simple, Default::default());
        let child_b = Task::child_of(&parent, "p-b", "do b", Some("implement".into()), Complexity::Simple, Default::default());
        proc.board.create(child_a).await.unwrap();
        proc.board.create(child_b).await.unwrap();
        proc.registry.record("p", vec!["p-a".into(), "p-b".into()]).await.unwrap();

        proc.board.claim_next("coder-1", "implement", 0, None).await.unwrap();
        proc.board.complete("p-a", Some("result a".into())).await.unwrap();
        proc.on_task_settled("p-a").await.unwrap();

        let parent_task = proc.board.get("p").await.unwrap().unwrap();
        assert_eq!(parent_task.status, TaskStatus::Claimed);

        proc.board.claim_next("coder-2", "implement", 0, None).await.unwrap();
        proc.board.complete("p-b", Some("result b".into())).await.unwrap();
        proc.on_task_settled("p-b").await.unwrap();

        let parent_task = proc.board.get("p").await.unwrap().unwrap();
        assert_eq!(parent_task.status, TaskStatus::Completed);
        assert_eq!(parent_task.result.as_deref(), Some("final answer"));
    }

    #[tokio::test]
    async fn failed_subtask_fails_the_parent() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(dir.path(), router_with(vec![]));
        let parent = Task::new_root("p", "build a widget", Some("planner".into()), Complexity::Normal, Source::new("x"));
        proc.board.create(parent.clone()).await.unwrap();
        proc.board.claim("p", "planner-1", "planner", 0).await.unwrap();

        let child = Task::child_of(&parent, "p-a", "do a", Some("implement".into()), Complexity::Simple, Default::default());
        proc.board.create(child).await.unwrap();
        proc.registry.record("p", vec!["p-a".into()]).await.unwrap();

        proc.board.claim_next("coder-1", "implement", 0, None).await.unwrap();
        proc.board.fail("p-a", "boom").await.unwrap();
        proc.on_task_settled("p-a").await.unwrap();

        let parent_task = proc.board.get("p").await.unwrap().unwrap();
        assert_eq!(parent_task.status, TaskStatus::Failed);
    }

    #[tokio::test]
    async fn unrelated_task_settlement_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let proc = processor(dir.path(), router_with(vec![]));
        let _ = MailboxHub::new(dir.path().join("mailboxes"));
        let task = Task::new_root("solo", "x", Some("implement".into()), Complexity::Simple, Source::new("x"));
        proc.board.create(task).await.unwrap();
        proc.on_task_settled("solo").await.unwrap();
    }
}
