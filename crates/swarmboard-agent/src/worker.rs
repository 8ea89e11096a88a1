//! Agent Worker Loop (C8): per-tick mailbox scan, critique revision, regular
//! claim with a bounded tool-dispatch loop, then progressive idle backoff.

use crate::config::WorkerConfig;
use crate::context::ContextWindow;
use crate::provider::ProviderResponse;
use crate::router::ProviderRouter;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use swarmboard_board::Board;
use swarmboard_bus::{ContextBus, MailboxHub, WakeupBus};
use swarmboard_core::{
    Complexity, CritiqueItem, CritiqueSpec, Dimensions, MailboxMessage, Message, MessageType,
    SwarmError, SwarmResult, Task, TaskStatus, ToolCall,
};
use swarmboard_tools::ToolRegistry;
use tracing::{info, warn};

/// Role-specific handling the orchestrator owns: sub-task decomposition for
/// planner results, and close-out readiness checks after a task settles.
/// Kept as an injected trait rather than a crate dependency so the worker
/// loop stays agnostic of how decomposition or synthesis are implemented.
#[async_trait]
pub trait TaskPostProcessor: Send + Sync {
    async fn decompose(&self, task: &Task, result: &str) -> SwarmResult<()>;
    async fn on_task_settled(&self, task_id: &str) -> SwarmResult<()>;
}

/// Why [`AgentWorker::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    ShuttingDown,
    IdleExhausted,
}

pub struct AgentWorker {
    config: WorkerConfig,
    board: Board,
    mailbox: MailboxHub,
    context_bus: ContextBus,
    wakeup: WakeupBus,
    tools: ToolRegistry,
    router: ProviderRouter,
    reviewer_agent_id: Option<String>,
    post_processor: Option<Arc<dyn TaskPostProcessor>>,
}

impl AgentWorker {
    pub fn new(
        config: WorkerConfig,
        board: Board,
        mailbox: MailboxHub,
        context_bus: ContextBus,
        wakeup: WakeupBus,
        tools: ToolRegistry,
        router: ProviderRouter,
    ) -> Self {
        Self {
            config,
            board,
            mailbox,
            context_bus,
            wakeup,
            tools,
            router,
            reviewer_agent_id: None,
            post_processor: None,
        }
    }

    pub fn with_reviewer(mut self, reviewer_agent_id: impl Into<String>) -> Self {
        self.reviewer_agent_id = Some(reviewer_agent_id.into());
        self
    }

    pub fn with_post_processor(mut self, post_processor: Arc<dyn TaskPostProcessor>) -> Self {
        self.post_processor = Some(post_processor);
        self
    }

    /// Runs the worker loop until a shutdown message arrives or
    /// `max_idle_cycles` consecutive idle ticks elapse. Spawns the
    /// stale-task recovery sweep alongside it and aborts it on exit.
    pub async fn run(&self) -> SwarmResult<WorkerOutcome> {
        let sweep_board = self.board.clone();
        let sweep = tokio::spawn(async move {
            let mut tick = tokio::time::interval(Duration::from_secs(30));
            loop {
                tick.tick().await;
                if let Ok(recovered) = sweep_board.recover_stale_tasks().await {
                    if !recovered.is_empty() {
                        info!(count = recovered.len(), "recovered stale tasks");
                    }
                }
            }
        });

        let outcome = self.run_loop().await;
        sweep.abort();
        outcome
    }

    async fn run_loop(&self) -> SwarmResult<WorkerOutcome> {
        let mut idle_cycles: u32 = 0;
        let mut last_probe = tokio::time::Instant::now();
        let probe_interval = Duration::from_secs(self.config.probe_interval_secs);

        loop {
            if last_probe.elapsed() >= probe_interval {
                self.router.probe_open_providers().await;
                last_probe = tokio::time::Instant::now();
            }

            if self.scan_mailbox().await? {
                return Ok(WorkerOutcome::ShuttingDown);
            }

            if self.revise_critique().await? {
                idle_cycles = 0;
                continue;
            }

            if self.claim_and_work().await? {
                idle_cycles = 0;
                continue;
            }

            idle_cycles += 1;
            if idle_cycles > self.config.max_idle_cycles {
                info!(agent_id = %self.config.agent_id, "idle-exiting after max idle cycles");
                return Ok(WorkerOutcome::IdleExhausted);
            }
            self.wakeup.wait(self.idle_backoff(idle_cycles)).await;
        }
    }

    fn idle_backoff(&self, idle_cycles: u32) -> Duration {
        let min = self.config.idle_backoff_min_ms;
        let max = self.config.idle_backoff_max_ms;
        let step = min.saturating_mul(u64::from(idle_cycles));
        Duration::from_millis(min.saturating_add(step).min(max))
    }

    /// Drains the mailbox. Returns `true` if a shutdown message was seen.
    async fn scan_mailbox(&self) -> SwarmResult<bool> {
        let messages = self.mailbox.read(&self.config.agent_id).await?;
        if MailboxHub::has_shutdown(&messages) {
            info!(agent_id = %self.config.agent_id, "shutdown observed, exiting worker loop");
            return Ok(true);
        }

        for msg in messages {
            if msg.message_type == MessageType::CritiqueRequest {
                if let Err(e) = self.handle_critique_request(&msg).await {
                    warn!(agent_id = %self.config.agent_id, error = %e, "critique request failed");
                }
            }
        }
        Ok(false)
    }

    async fn handle_critique_request(&self, msg: &MailboxMessage) -> SwarmResult<()> {
        let task_id = msg.content["task_id"]
            .as_str()
            .ok_or_else(|| SwarmError::Agent("critique_request missing task_id".into()))?;
        let description = msg.content["description"].as_str().unwrap_or_default();
        let result = msg.content["result"].as_str().unwrap_or_default();

        let prompt = format!(
            "You are reviewing a completed task.\n\nTask: {description}\nResult:\n{result}\n\n\
             Score accuracy, completeness, technical, calibration, efficiency each 1-10, list up \
             to three critique items, and give a confidence in [0,1]. Respond with JSON only: \
             {{\"accuracy\":n,\"completeness\":n,\"technical\":n,\"calibration\":n,\"efficiency\":n,\
             \"items\":[{{\"dimension\":\"...\",\"note\":\"...\"}}],\"confidence\":n}}"
        );
        let response = self.router.chat(None, &[Message::user(prompt, task_id)], &[]).await?;
        let critique = parse_critique_response(response.text().unwrap_or_default())?;

        self.board.add_critique(task_id, critique).await?;
        if let Some(pp) = &self.post_processor {
            pp.on_task_settled(task_id).await?;
        }
        Ok(())
    }

    /// If this worker owns a task in `critique` status, claims, revises, and
    /// resubmits it. Returns `true` if one was found and handled.
    async fn revise_critique(&self) -> SwarmResult<bool> {
        let snapshot = self.board.snapshot().await?;
        let Some(task) = snapshot.into_iter().find(|t| {
            t.status == TaskStatus::Critique && t.agent_id.as_deref() == Some(self.config.agent_id.as_str())
        }) else {
            return Ok(false);
        };

        self.board.claim_critique(task.id.clone(), self.config.agent_id.clone()).await?;

        let mut prompt = format!(
            "Revise your previous result for this task based on reviewer feedback.\n\nTask: {}\n\nPrevious result:\n{}\n",
            task.description,
            task.result.as_deref().unwrap_or_default(),
        );
        if let Some(critique) = &task.critique {
            prompt.push_str("\nCritique items:\n");
            for item in &critique.items {
                prompt.push_str(&format!("- [{}] {}\n", item.dimension, item.note));
            }
        }

        let system_prompt = self.build_system_prompt().await?;
        let mut window = ContextWindow::new(self.config.prompt_budget_chars);
        window.set_system_prompt(system_prompt);
        window.push(Message::user(prompt, task.id.clone()));

        let result = self.run_tool_loop(&task, window).await?;
        self.board.submit_for_review(task.id.clone(), result).await?;
        if let Some(pp) = &self.post_processor {
            pp.on_task_settled(&task.id).await?;
        }
        Ok(true)
    }

    /// Claims the next claimable task matching this worker's role and runs
    /// it to completion. Returns `true` if a task was claimed.
    async fn claim_and_work(&self) -> SwarmResult<bool> {
        let Some(task_id) = self
            .board
            .claim_next(
                self.config.agent_id.clone(),
                self.config.role.clone(),
                self.config.reputation,
                self.config.restricted_to_roles.clone(),
            )
            .await?
        else {
            return Ok(false);
        };

        let task = self
            .board
            .get(&task_id)
            .await?
            .ok_or_else(|| SwarmError::Agent(format!("claimed task '{task_id}' vanished")))?;

        let system_prompt = self.build_system_prompt().await?;
        let mut window = ContextWindow::new(self.config.prompt_budget_chars);
        window.set_system_prompt(system_prompt);
        window.push(Message::user(task.description.clone(), task_id.clone()));

        let result = self.run_tool_loop(&task, window).await?;

        if self.config.role == "planner" {
            if let Some(pp) = &self.post_processor {
                pp.decompose(&task, &result).await?;
            }
        } else if task.complexity == Complexity::Simple {
            self.board.complete(task_id.clone(), Some(result)).await?;
        } else {
            self.board.submit_for_review(task_id.clone(), result.clone()).await?;
            if let Some(reviewer) = &self.reviewer_agent_id {
                self.mailbox
                    .send(
                        reviewer.clone(),
                        MailboxMessage::critique_request(
                            self.config.agent_id.clone(),
                            task_id.clone(),
                            task.description.clone(),
                            result.clone(),
                        ),
                    )
                    .await?;
            }
        }

        if let Some(pp) = &self.post_processor {
            pp.on_task_settled(&task_id).await?;
        }
        Ok(true)
    }

    /// Drives the model + tool-dispatch loop for one task until the model
    /// emits a final response, the cancellation flag is observed, or
    /// `max_tool_iterations` is exhausted.
    async fn run_tool_loop(&self, task: &Task, mut window: ContextWindow) -> SwarmResult<String> {
        let tools = self.tools.schemas();

        for _ in 0..self.config.max_tool_iterations {
            if self.board.is_cancelled(&task.id).await? {
                return Err(SwarmError::Cancelled);
            }

            let response = self.router.chat(window.system_prompt(), window.messages(), &tools).await?;
            match response {
                ProviderResponse::Done(text) | ProviderResponse::Text(text) => {
                    window.push(Message::assistant(text.clone(), task.id.as_str()));
                    return Ok(text);
                }
                ProviderResponse::ToolUse { content, tool_calls } => {
                    if let Some(text) = content {
                        window.push(Message::assistant(text, task.id.as_str()));
                    }
                    for call in tool_calls {
                        self.dispatch_tool_call(&mut window, &task.id, call).await;
                    }
                }
            }
        }

        Err(SwarmError::Agent(format!(
            "task '{}' exceeded {} tool iterations",
            task.id, self.config.max_tool_iterations
        )))
    }

    async fn dispatch_tool_call(&self, window: &mut ContextWindow, task_id: &str, call: ToolCall) {
        info!(task_id = %task_id, tool = %call.name, "dispatching tool call");
        let outcome = self.tools.invoke(&call.name, call.arguments).await;
        let payload = match outcome {
            swarmboard_tools::ToolOutcome::Ok { value } => {
                serde_json::json!({"tool_use_id": call.id, "content": value, "is_error": false})
            }
            swarmboard_tools::ToolOutcome::Error { kind, message } => {
                warn!(task_id = %task_id, tool = %call.name, kind = %kind, "tool call failed");
                serde_json::json!({"tool_use_id": call.id, "content": message, "is_error": true})
            }
        };
        window.push(Message::tool(payload.to_string(), task_id));
    }

    async fn build_system_prompt(&self) -> SwarmResult<String> {
        let mut prompt = format!(
            "You are the '{}' agent ({}), operating as part of a coordinated multi-agent task system.\n",
            self.config.agent_id, self.config.role
        );

        let tool_names: Vec<String> = self.tools.schemas().into_iter().map(|s| s.name).collect();
        if !tool_names.is_empty() {
            prompt.push_str(&format!("Available tools: {}.\n", tool_names.join(", ")));
        }

        let snapshot = self.context_bus.snapshot().await?;
        if !snapshot.is_empty() {
            prompt.push_str("Known facts published by other agents:\n");
            for entry in snapshot.iter().take(20) {
                prompt.push_str(&format!("- {}: {}\n", entry.namespaced_key(), entry.value));
            }
        }

        Ok(prompt)
    }
}

/// Parses the reviewer model's JSON verdict into a [`CritiqueSpec`]. Applies
/// `CritiqueSpec::derive` rather than trusting the model's verdict directly,
/// since the floor/ceiling rule must hold regardless of what the model says.
fn parse_critique_response(text: &str) -> SwarmResult<CritiqueSpec> {
    let trimmed = text.trim();
    let json_start = trimmed.find('{').ok_or_else(|| SwarmError::Agent("critique response had no JSON object".into()))?;
    let value: serde_json::Value = serde_json::from_str(&trimmed[json_start..])
        .map_err(|e| SwarmError::Agent(format!("malformed critique JSON: {e}")))?;

    let dim = |key: &str| -> u8 { value[key].as_u64().unwrap_or(5).clamp(1, 10) as u8 };
    let dimensions = Dimensions {
        accuracy: dim("accuracy"),
        completeness: dim("completeness"),
        technical: dim("technical"),
        calibration: dim("calibration"),
        efficiency: dim("efficiency"),
    };
    let items: Vec<CritiqueItem> = value["items"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|i| {
                    Some(CritiqueItem {
                        dimension: i["dimension"].as_str()?.to_string(),
                        note: i["note"].as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    let confidence = value["confidence"].as_f64().unwrap_or(0.5);

    Ok(CritiqueSpec::derive(dimensions, items, confidence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{ProviderEntry, SelectionStrategy};
    use async_trait::async_trait as at;
    use std::sync::Mutex;
    use swarmboard_core::{Complexity, Source, ToolSchema};

    struct ScriptedProvider {
        turns: Mutex<Vec<ProviderResponse>>,
    }

    #[at]
    impl crate::provider::ModelProvider for ScriptedProvider {
        async fn chat(
            &self,
            _model: &str,
            _api_key: Option<&str>,
            _system_prompt: Option<&str>,
            _messages: &[Message],
            _tools: &[ToolSchema],
        ) -> SwarmResult<(ProviderResponse, crate::provider::CallStats)> {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                return Err(SwarmError::Provider("scripted provider exhausted".into()));
            }
            Ok((turns.remove(0), crate::provider::CallStats::default()))
        }
    }

    fn router_with(turns: Vec<ProviderResponse>) -> ProviderRouter {
        let provider = ScriptedProvider { turns: Mutex::new(turns) };
        let entry = ProviderEntry::new("scripted", Box::new(provider), vec!["m1".into()], 0, 0.0);
        ProviderRouter::new(vec![entry], SelectionStrategy::Preference)
    }

    fn worker_with(router: ProviderRouter, dir: &std::path::Path, agent_id: &str, role: &str) -> AgentWorker {
        let board = Board::new(dir.join("task_board.json"));
        let mailbox = MailboxHub::new(dir.join("mailboxes"));
        let context_bus = ContextBus::new(dir.join("context_bus.json"));
        let wakeup = WakeupBus::new(dir.join("task_signals"));
        let tools = ToolRegistry::new();
        let config = WorkerConfig::new(agent_id, role);
        AgentWorker::new(config, board, mailbox, context_bus, wakeup, tools, router)
    }

    #[tokio::test]
    async fn simple_task_completes_without_review() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_with(vec![ProviderResponse::Done("all done".into())]);
        let worker = worker_with(router, dir.path(), "coder-1", "implement");

        worker
            .board
            .create(Task::new_root("t1", "do a thing", Some("implement".into()), Complexity::Simple, Source::new("test")))
            .await
            .unwrap();

        let claimed = worker.claim_and_work().await.unwrap();
        assert!(claimed);

        let task = worker.board.get("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("all done"));
    }

    #[tokio::test]
    async fn normal_task_goes_to_review_and_notifies_reviewer() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_with(vec![ProviderResponse::Done("the result".into())]);
        let worker = worker_with(router, dir.path(), "coder-1", "implement").with_reviewer("reviewer-1");

        worker
            .board
            .create(Task::new_root("t1", "do a thing", Some("implement".into()), Complexity::Normal, Source::new("test")))
            .await
            .unwrap();

        worker.claim_and_work().await.unwrap();

        let task = worker.board.get("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Review);

        let inbox = worker.mailbox.read("reviewer-1").await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message_type, MessageType::CritiqueRequest);
    }

    #[tokio::test]
    async fn tool_use_turn_is_dispatched_then_final_turn_completes() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_with(vec![
            ProviderResponse::ToolUse {
                content: None,
                tool_calls: vec![ToolCall { id: "c1".into(), name: "echo".into(), arguments: serde_json::json!({}) }],
            },
            ProviderResponse::Done("finished after tool use".into()),
        ]);
        let worker = worker_with(router, dir.path(), "coder-1", "implement");

        worker
            .board
            .create(Task::new_root("t1", "do a thing", Some("implement".into()), Complexity::Simple, Source::new("test")))
            .await
            .unwrap();

        worker.claim_and_work().await.unwrap();
        let task = worker.board.get("t1").await.unwrap().unwrap();
        assert_eq!(task.result.as_deref(), Some("finished after tool use"));
    }

    #[tokio::test]
    async fn mailbox_shutdown_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_with(vec![]);
        let worker = worker_with(router, dir.path(), "coder-1", "implement");
        worker.mailbox.send("coder-1", MailboxMessage::shutdown("runtime")).await.unwrap();

        let stopped = worker.scan_mailbox().await.unwrap();
        assert!(stopped);
    }

    #[tokio::test]
    async fn critique_revision_auto_completes_on_round_cap() {
        let dir = tempfile::tempdir().unwrap();
        let router = router_with(vec![ProviderResponse::Done("revised result".into())]);
        let worker = worker_with(router, dir.path(), "coder-1", "implement");

        let mut task = Task::new_root("t1", "do a thing", Some("implement".into()), Complexity::Normal, Source::new("test"));
        worker.board.create(task.clone()).await.unwrap();
        worker.board.claim("t1", "coder-1", "implement", 0).await.unwrap();
        worker.board.submit_for_review("t1", "first attempt").await.unwrap();
        let critique = CritiqueSpec::derive(
            Dimensions { accuracy: 4, completeness: 9, technical: 9, calibration: 9, efficiency: 9 },
            vec![],
            0.7,
        );
        worker.board.add_critique("t1", critique).await.unwrap();
        task = worker.board.get("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Critique);

        let revised = worker.revise_critique().await.unwrap();
        assert!(revised);

        let task = worker.board.get("t1").await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("revised result"));
    }

    #[test]
    fn parses_critique_json_embedded_in_prose() {
        let text = "Here is my review:\n{\"accuracy\":9,\"completeness\":9,\"technical\":9,\"calibration\":9,\"efficiency\":9,\"items\":[],\"confidence\":0.9}";
        let critique = parse_critique_response(text).unwrap();
        assert!(matches!(critique.verdict, swarmboard_core::Verdict::Lgtm));
    }
}
