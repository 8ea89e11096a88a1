//! Provider Router (§4.9 layer 1): selects among configured providers,
//! drives per-model retry/fallback, and feeds the circuit breaker,
//! credential rotator, and usage ledger.

use crate::breaker::{BreakerState, CircuitBreaker};
use crate::credentials::CredentialRotator;
use crate::provider::{CallStats, ModelProvider, ProviderResponse};
use crate::retry::{compute_backoff, is_retryable, RetryPolicy};
use crate::usage::{BudgetLimits, UsageLedger, UsageRecord};
use chrono::Utc;
use std::sync::Mutex;
use swarmboard_core::{Message, SwarmError, SwarmResult, ToolSchema};
use tracing::{info, warn};

/// Strategy for choosing among providers that are currently admissible
/// (breaker not `OPEN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStrategy {
    Latency,
    Cost,
    Preference,
    RoundRobin,
}

/// One entry in the router: a provider implementation plus its routing
/// metadata (priority, cost hint) and resilience state (breaker, retry
/// policy, credential rotator).
pub struct ProviderEntry {
    pub name: String,
    provider: Box<dyn ModelProvider>,
    pub models: Vec<String>,
    pub priority: u32,
    pub cost_per_1k: f64,
    pub retry_policy: RetryPolicy,
    breaker: Mutex<CircuitBreaker>,
    credentials: Option<Mutex<CredentialRotator>>,
    latency_ema_ms: Mutex<f64>,
}

impl ProviderEntry {
    pub fn new(
        name: impl Into<String>,
        provider: Box<dyn ModelProvider>,
        models: Vec<String>,
        priority: u32,
        cost_per_1k: f64,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            models,
            priority,
            cost_per_1k,
            retry_policy: RetryPolicy::default(),
            breaker: Mutex::new(CircuitBreaker::new(3, 120)),
            credentials: None,
            latency_ema_ms: Mutex::new(0.0),
        }
    }

    pub fn with_credentials(mut self, keys: Vec<String>) -> Self {
        self.credentials = Some(Mutex::new(CredentialRotator::new(keys)));
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn allow(&self) -> bool {
        self.breaker.lock().unwrap_or_else(|e| e.into_inner()).allow_call(Utc::now())
    }

    fn latency_ema(&self) -> f64 {
        *self.latency_ema_ms.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_latency(&self, ms: u64) {
        let mut ema = self.latency_ema_ms.lock().unwrap_or_else(|e| e.into_inner());
        *ema = if *ema == 0.0 { ms as f64 } else { 0.7 * *ema + 0.3 * ms as f64 };
    }
}

/// The top-level resilient model client: routes across providers, retries
/// within a provider, falls back across models, and records usage.
pub struct ProviderRouter {
    entries: Vec<ProviderEntry>,
    strategy: SelectionStrategy,
    round_robin_cursor: Mutex<usize>,
    pub usage: Mutex<UsageLedger>,
}

impl ProviderRouter {
    pub fn new(entries: Vec<ProviderEntry>, strategy: SelectionStrategy) -> Self {
        assert!(!entries.is_empty(), "a provider router needs at least one provider");
        Self {
            entries,
            strategy,
            round_robin_cursor: Mutex::new(0),
            usage: Mutex::new(UsageLedger::new()),
        }
    }

    pub fn set_budget(&mut self, provider: &str, limits: BudgetLimits) {
        self.usage.lock().unwrap_or_else(|e| e.into_inner()).set_limits(provider, limits);
    }

    /// Orders admissible (non-`OPEN`) providers by the configured strategy.
    fn ordered_candidates(&self) -> Vec<usize> {
        let mut candidates: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.allow())
            .map(|(i, _)| i)
            .collect();

        match self.strategy {
            SelectionStrategy::Latency => {
                candidates.sort_by(|&a, &b| {
                    self.entries[a]
                        .latency_ema()
                        .partial_cmp(&self.entries[b].latency_ema())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            SelectionStrategy::Cost => {
                candidates.sort_by(|&a, &b| {
                    self.entries[a]
                        .cost_per_1k
                        .partial_cmp(&self.entries[b].cost_per_1k)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }
            SelectionStrategy::Preference => {
                candidates.sort_by_key(|&i| self.entries[i].priority);
            }
            SelectionStrategy::RoundRobin => {
                let mut cursor = self.round_robin_cursor.lock().unwrap_or_else(|e| e.into_inner());
                if !candidates.is_empty() {
                    let len = candidates.len();
                    candidates.rotate_left(*cursor % len);
                    *cursor = cursor.wrapping_add(1);
                }
            }
        }
        candidates
    }

    /// Runs the full resilient call: provider selection, per-model retry
    /// with backoff, model fallback, credential rotation on rate-limit, and
    /// usage recording. Returns the first successful response.
    pub async fn chat(
        &self,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> SwarmResult<ProviderResponse> {
        let candidates = self.ordered_candidates();
        if candidates.is_empty() {
            return Err(SwarmError::Provider("no provider is currently admissible (all breakers open)".into()));
        }

        let mut last_err: Option<SwarmError> = None;
        let mut used_fallback = false;

        for &idx in &candidates {
            let entry = &self.entries[idx];
            {
                let now = Utc::now();
                if let Err(e) = self.usage.lock().unwrap_or_else(|e| e.into_inner()).check_budget(&entry.name, now) {
                    warn!(provider = %entry.name, "budget exceeded, skipping provider");
                    last_err = Some(e);
                    continue;
                }
            }

            for model in &entry.models {
                match self.call_with_retry(entry, model, system_prompt, messages, tools).await {
                    Ok((resp, stats)) => {
                        entry.breaker.lock().unwrap_or_else(|e| e.into_inner()).on_success();
                        entry.record_latency(stats.latency_ms);
                        self.usage.lock().unwrap_or_else(|e| e.into_inner()).record(UsageRecord {
                            provider: entry.name.clone(),
                            model: model.clone(),
                            prompt_tokens: stats.prompt_tokens,
                            completion_tokens: stats.completion_tokens,
                            latency_ms: stats.latency_ms,
                            retries: 0,
                            used_fallback,
                            estimated_cost: estimate_cost(entry.cost_per_1k, stats.prompt_tokens, stats.completion_tokens),
                            timestamp: Utc::now(),
                        });
                        return Ok(resp);
                    }
                    Err(e) => {
                        warn!(provider = %entry.name, model = %model, error = %e, "model exhausted, trying fallback");
                        last_err = Some(e);
                        used_fallback = true;
                    }
                }
            }
            entry.breaker.lock().unwrap_or_else(|e| e.into_inner()).on_failure(Utc::now());
        }

        Err(last_err.unwrap_or_else(|| SwarmError::Provider("all providers exhausted".into())))
    }

    async fn call_with_retry(
        &self,
        entry: &ProviderEntry,
        model: &str,
        system_prompt: Option<&str>,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> SwarmResult<(ProviderResponse, CallStats)> {
        let mut last_err: Option<SwarmError> = None;

        for attempt in 0..=entry.retry_policy.max_retries {
            let api_key = entry
                .credentials
                .as_ref()
                .map(|c| c.lock().unwrap_or_else(|e| e.into_inner()).current().to_string());
            match entry.provider.chat(model, api_key.as_deref(), system_prompt, messages, tools).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    let rate_limited = e.to_string().contains("429");
                    if rate_limited {
                        if let Some(creds) = &entry.credentials {
                            let cycled = creds.lock().unwrap_or_else(|e| e.into_inner()).rotate();
                            if cycled {
                                return Err(e);
                            }
                            info!(provider = %entry.name, "rotated credential after rate limit");
                            last_err = Some(e);
                            continue;
                        }
                    }
                    if !is_retryable(&e) {
                        return Err(e);
                    }
                    if attempt < entry.retry_policy.max_retries {
                        let delay = compute_backoff(&entry.retry_policy, attempt);
                        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                    }
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| SwarmError::Provider("retries exhausted".into())))
    }

    /// Health probe (§12): issues a minimal call through each `OPEN`
    /// provider's breaker to half-open/close it proactively.
    pub async fn probe_open_providers(&self) {
        for entry in &self.entries {
            let is_open = matches!(
                entry.breaker.lock().unwrap_or_else(|e| e.into_inner()).state(),
                BreakerState::Open
            );
            if !is_open {
                continue;
            }
            if !entry.allow() {
                continue;
            }
            let Some(model) = entry.models.first() else {
                continue;
            };
            let api_key = entry
                .credentials
                .as_ref()
                .map(|c| c.lock().unwrap_or_else(|e| e.into_inner()).current().to_string());
            match entry
                .provider
                .chat(model, api_key.as_deref(), None, &[Message::user("ping", "health-probe")], &[])
                .await
            {
                Ok(_) => entry.breaker.lock().unwrap_or_else(|e| e.into_inner()).on_success(),
                Err(_) => entry.breaker.lock().unwrap_or_else(|e| e.into_inner()).on_failure(Utc::now()),
            }
        }
    }
}

fn estimate_cost(cost_per_1k: f64, prompt_tokens: u64, completion_tokens: u64) -> f64 {
    ((prompt_tokens + completion_tokens) as f64 / 1000.0) * cost_per_1k
}
