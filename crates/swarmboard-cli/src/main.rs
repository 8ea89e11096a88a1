//! Ambient entry point: config loading, logging init, and the binary's
//! four subcommands — `run` (the supervisor loop), `submit` (create a root
//! task and optionally wait on it), and `board ls`/`board show` (read-only
//! inspection, §12's supplemented board-inspection feature).

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use swarmboard_agent::{
    AgentWorker, ClaudeProvider, ModelProvider, OpenAiProvider, ProviderEntry, ProviderRouter,
    SelectionStrategy, TaskPostProcessor, WorkerConfig, WorkerOutcome,
};
use swarmboard_board::Board;
use swarmboard_bus::{ContextBus, MailboxHub, WakeupBus};
use swarmboard_core::Task;
use swarmboard_orchestrator::{Orchestrator, SubtaskRegistry, SynthesisProcessor};
use swarmboard_runtime::{AgentDefinition, AsyncTaskFactory, LazyRuntime, RuntimeConfig};
use swarmboard_tools::ToolRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swarmboard", about = "Swarmboard — multi-agent task coordination core")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "swarmboard.toml")]
    config: PathBuf,

    /// Overrides the config's `data_dir`.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the supervisor: launches every configured agent under the
    /// lazy runtime and keeps ticking until interrupted.
    Run,
    /// Classify and create a root task, optionally waiting for it to settle.
    Submit {
        text: String,
        /// Block until the task reaches a terminal status.
        #[arg(long)]
        wait: bool,
        /// Max seconds to wait when `--wait` is set.
        #[arg(long, default_value_t = 600)]
        timeout: u64,
    },
    /// Inspect the task board.
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// List every task with its status, role, and claimant.
    Ls,
    /// Show one task's full record.
    Show { id: String },
}

#[derive(Debug, Clone, Deserialize)]
struct SwarmboardConfig {
    #[serde(default = "default_data_dir")]
    data_dir: PathBuf,
    #[serde(default)]
    runtime: RuntimeSection,
    #[serde(default)]
    provider_router: ProviderRouterSection,
    #[serde(default)]
    agents: Vec<AgentSection>,
    #[serde(default)]
    compaction: CompactionSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RuntimeSection {
    mode: String,
    always_on: Vec<String>,
    idle_shutdown: i64,
    shutdown_grace: i64,
    kill_after: i64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            mode: "lazy".to_string(),
            always_on: Vec::new(),
            idle_shutdown: 300,
            shutdown_grace: 5,
            kill_after: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ProviderRouterSection {
    strategy: String,
    probe_interval: u64,
    providers: HashMap<String, ProviderSection>,
}

impl Default for ProviderRouterSection {
    fn default() -> Self {
        Self { strategy: String::new(), probe_interval: 60, providers: HashMap::new() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct ProviderSection {
    kind: String,
    api_key_env: String,
    model: String,
    base_url: Option<String>,
    max_tokens: u32,
    priority: u32,
    cost_per_1k: f64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            kind: "claude".to_string(),
            api_key_env: String::new(),
            model: String::new(),
            base_url: None,
            max_tokens: 4096,
            priority: 0,
            cost_per_1k: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct AgentSection {
    id: String,
    role: String,
    #[serde(default)]
    restricted_to_roles: Option<Vec<String>>,
    #[serde(default)]
    reputation: i64,
    #[serde(default)]
    max_idle_cycles: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CompactionSection {
    prompt_budget_chars: usize,
}

impl Default for CompactionSection {
    fn default() -> Self {
        Self { prompt_budget_chars: 32_000 }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./swarmboard-data")
}

async fn load_config(path: &Path) -> anyhow::Result<SwarmboardConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let config: SwarmboardConfig =
        toml::from_str(&raw).with_context(|| format!("failed to parse config file '{}'", path.display()))?;
    Ok(config)
}

fn build_provider_entry(name: &str, section: &ProviderSection) -> anyhow::Result<ProviderEntry> {
    let api_key = std::env::var(&section.api_key_env)
        .with_context(|| format!("provider '{name}' needs env var '{}' set", section.api_key_env))?;

    let provider: Box<dyn ModelProvider> = match section.kind.as_str() {
        "openai" => {
            let mut backend = OpenAiProvider::new(api_key, section.max_tokens);
            if let Some(base_url) = &section.base_url {
                backend = backend.with_base_url(base_url.clone());
            }
            Box::new(backend)
        }
        other if other != "claude" => bail!("provider '{name}' has unknown kind '{other}' (expected claude or openai)"),
        _ => {
            let mut backend = ClaudeProvider::new(api_key, section.max_tokens);
            if let Some(base_url) = &section.base_url {
                backend = backend.with_base_url(base_url.clone());
            }
            Box::new(backend)
        }
    };

    Ok(ProviderEntry::new(name, provider, vec![section.model.clone()], section.priority, section.cost_per_1k))
}

fn build_router(section: &ProviderRouterSection) -> anyhow::Result<ProviderRouter> {
    let strategy = match section.strategy.as_str() {
        "latency" => SelectionStrategy::Latency,
        "cost" => SelectionStrategy::Cost,
        "round_robin" => SelectionStrategy::RoundRobin,
        _ => SelectionStrategy::Preference,
    };

    let mut entries = Vec::new();
    for (name, provider_section) in &section.providers {
        entries.push(build_provider_entry(name, provider_section)?);
    }
    if entries.is_empty() {
        bail!("provider_router.providers is empty; configure at least one model backend");
    }
    Ok(ProviderRouter::new(entries, strategy))
}

fn worker_config(
    agent: &AgentSection,
    compaction: &CompactionSection,
    provider_router: &ProviderRouterSection,
) -> WorkerConfig {
    let mut config = WorkerConfig::new(agent.id.clone(), agent.role.clone());
    config.reputation = agent.reputation;
    config.restricted_to_roles = agent.restricted_to_roles.clone();
    config.prompt_budget_chars = compaction.prompt_budget_chars;
    config.probe_interval_secs = provider_router.probe_interval;
    if let Some(max_idle) = agent.max_idle_cycles {
        config.max_idle_cycles = max_idle;
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config).await?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data_dir.clone());
    tokio::fs::create_dir_all(&data_dir).await?;

    let board = Board::new(data_dir.join("task_board.json"));
    let wakeup = WakeupBus::new(data_dir.join("task_signals"));

    match cli.command {
        Commands::Run => run_supervisor(config, data_dir, board, wakeup).await,
        Commands::Submit { text, wait, timeout } => {
            let orchestrator = Orchestrator::new(board, wakeup);
            let id = orchestrator.submit(text, None).await?;
            println!("{id}");
            if wait {
                let task = orchestrator.wait(&id, Duration::from_secs(timeout)).await?;
                print_task(&task);
            }
            Ok(())
        }
        Commands::Board { action } => board_command(action, board).await,
    }
}

async fn run_supervisor(
    config: SwarmboardConfig,
    data_dir: PathBuf,
    board: Board,
    wakeup: WakeupBus,
) -> anyhow::Result<()> {
    if config.runtime.mode == "process" {
        bail!("runtime.mode = \"process\" is not supported; agents run as supervised async tasks (lazy/in_process)");
    }

    let mailbox = MailboxHub::new(data_dir.join("mailboxes"));
    let context_bus = ContextBus::new(data_dir.join("context_bus.json"));
    let registry = SubtaskRegistry::new(data_dir.join("subtasks.json"));

    let synthesis_router =
        Arc::new(build_router(&config.provider_router).context("building the synthesis processor's model router")?);
    let synthesis: Arc<dyn TaskPostProcessor> = Arc::new(SynthesisProcessor::new(
        board.clone(),
        registry,
        wakeup.clone(),
        synthesis_router,
        Arc::new(ToolRegistry::new()),
    ));

    let agent_sections: HashMap<String, AgentSection> =
        config.agents.iter().cloned().map(|a| (a.id.clone(), a)).collect();
    let provider_router_section = config.provider_router.clone();
    let compaction = config.compaction.clone();

    let factory_board = board.clone();
    let factory_mailbox = mailbox.clone();
    let factory_context_bus = context_bus.clone();
    let factory_wakeup = wakeup.clone();
    let factory_synthesis = synthesis.clone();

    let factory = AsyncTaskFactory::new(mailbox.clone(), move |agent_id: String| {
        let board = factory_board.clone();
        let mailbox = factory_mailbox.clone();
        let context_bus = factory_context_bus.clone();
        let wakeup = factory_wakeup.clone();
        let synthesis = factory_synthesis.clone();
        let agent_sections = agent_sections.clone();
        let provider_router_section = provider_router_section.clone();
        let compaction = compaction.clone();

        async move {
            let Some(section) = agent_sections.get(&agent_id) else {
                error!(agent_id, "launched an agent with no matching config section");
                return;
            };
            let config = worker_config(section, &compaction, &provider_router_section);

            loop {
                let router = match build_router(&provider_router_section) {
                    Ok(router) => router,
                    Err(e) => {
                        error!(agent_id, error = %e, "failed to build model router, worker will not run");
                        return;
                    }
                };
                let worker = AgentWorker::new(
                    config.clone(),
                    board.clone(),
                    mailbox.clone(),
                    context_bus.clone(),
                    wakeup.clone(),
                    ToolRegistry::new(),
                    router,
                )
                .with_post_processor(synthesis.clone());

                match worker.run().await {
                    Ok(WorkerOutcome::ShuttingDown) => {
                        info!(agent_id, "worker shut down");
                        break;
                    }
                    Ok(WorkerOutcome::IdleExhausted) => {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Err(e) => {
                        error!(agent_id, error = %e, "worker loop exited with an error, restarting after a delay");
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }
    });

    let runtime_config = RuntimeConfig {
        always_on: config.runtime.always_on.iter().cloned().collect(),
        idle_shutdown_seconds: config.runtime.idle_shutdown,
        shutdown_grace_seconds: config.runtime.shutdown_grace,
        kill_after_seconds: config.runtime.kill_after,
    };
    let runtime = LazyRuntime::new(board, runtime_config, Arc::new(factory));

    for section in &config.agents {
        let always_on = config.runtime.always_on.contains(&section.id);
        runtime
            .register(AgentDefinition::new(section.id.clone(), vec![section.role.clone()], always_on))
            .await?;
    }

    info!(agents = config.agents.len(), data_dir = %data_dir.display(), "supervisor started");

    let mut tick = tokio::time::interval(Duration::from_secs(2));
    let mut idle_check = tokio::time::interval(Duration::from_secs(60));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                if let Err(e) = runtime.tick().await {
                    warn!(error = %e, "runtime tick failed");
                }
            }
            _ = idle_check.tick() => {
                if let Err(e) = runtime.evaluate_idle().await {
                    warn!(error = %e, "idle evaluation failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

async fn board_command(action: BoardAction, board: Board) -> anyhow::Result<()> {
    match action {
        BoardAction::Ls => {
            let tasks = board.snapshot().await?;
            if tasks.is_empty() {
                println!("No tasks on the board.");
                return Ok(());
            }
            for task in &tasks {
                println!(
                    "{:<36} {:<12} role={:<10} agent={:<12} {}",
                    task.id,
                    format!("{:?}", task.status),
                    task.required_role.as_deref().unwrap_or("-"),
                    task.agent_id.as_deref().unwrap_or("-"),
                    truncate(&task.description, 48),
                );
            }
        }
        BoardAction::Show { id } => {
            let Some(task) = board.get(&id).await? else {
                bail!("no task found with id '{id}'");
            };
            print_task(&task);
        }
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!("id:            {}", task.id);
    println!("status:        {:?}", task.status);
    println!("required_role: {}", task.required_role.as_deref().unwrap_or("-"));
    println!("agent_id:      {}", task.agent_id.as_deref().unwrap_or("-"));
    println!("parent_id:     {}", task.parent_id.as_deref().unwrap_or("-"));
    println!("description:   {}", task.description);
    if let Some(result) = &task.result {
        println!("result:\n{result}");
    }
    if let Some(critique) = &task.critique {
        println!("critique round {}: {} item(s)", task.critique_round, critique.items.len());
        for item in &critique.items {
            println!("  [{}] {}", item.dimension, item.note);
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.len() > max {
        format!("{}…", &collapsed[..max])
    } else {
        collapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_config_applies_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarmboard.toml");
        tokio::fs::write(
            &path,
            r#"
            [[agents]]
            id = "planner-1"
            role = "planner"
            "#,
        )
        .await
        .unwrap();

        let config = load_config(&path).await.unwrap();
        assert_eq!(config.data_dir, default_data_dir());
        assert_eq!(config.runtime.mode, "lazy");
        assert_eq!(config.runtime.idle_shutdown, 300);
        assert_eq!(config.agents.len(), 1);
        assert_eq!(config.agents[0].reputation, 0);
        assert_eq!(config.compaction.prompt_budget_chars, 32_000);
    }

    #[test]
    fn build_router_rejects_an_empty_provider_table() {
        let section = ProviderRouterSection::default();
        let result = build_router(&section);
        assert!(result.is_err());
    }

    #[test]
    fn build_provider_entry_errors_when_the_api_key_env_var_is_unset() {
        let section = ProviderSection {
            api_key_env: "SWARMBOARD_TEST_UNSET_KEY_VAR".to_string(),
            model: "claude-3-5-sonnet".to_string(),
            ..Default::default()
        };
        let result = build_provider_entry("primary", &section);
        assert!(result.is_err());
    }

    #[test]
    fn worker_config_applies_agent_overrides() {
        let agent = AgentSection {
            id: "reviewer-1".to_string(),
            role: "review".to_string(),
            restricted_to_roles: Some(vec!["review".to_string()]),
            reputation: 5,
            max_idle_cycles: Some(0),
        };
        let compaction = CompactionSection { prompt_budget_chars: 8_000 };
        let provider_router = ProviderRouterSection { probe_interval: 120, ..Default::default() };
        let config = worker_config(&agent, &compaction, &provider_router);
        assert_eq!(config.agent_id, "reviewer-1");
        assert_eq!(config.reputation, 5);
        assert_eq!(config.max_idle_cycles, 0);
        assert_eq!(config.prompt_budget_chars, 8_000);
        assert_eq!(config.probe_interval_secs, 120);
        assert_eq!(config.restricted_to_roles, Some(vec!["review".to_string()]));
    }

    #[test]
    fn truncate_collapses_whitespace_and_ellipsizes_long_text() {
        assert_eq!(truncate("hello   world", 48), "hello world");
        let long = "word ".repeat(20);
        let truncated = truncate(&long, 10);
        assert!(truncated.ends_with('…'));
        assert!(truncated.chars().count() <= 11);
    }
}
