//! Usage accounting (§4.9 layer 5) and the usage ledger summary (§12).

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use swarmboard_core::{SwarmError, SwarmResult};

/// One terminal call record: success or terminal failure.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub latency_ms: u64,
    pub retries: u32,
    pub used_fallback: bool,
    pub estimated_cost: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-provider spend caps, checked before admitting a call.
#[derive(Debug, Clone, Default)]
pub struct BudgetLimits {
    pub daily: Option<f64>,
    pub monthly: Option<f64>,
}

/// Accumulates [`UsageRecord`]s in memory and enforces daily/monthly spend
/// caps per provider.
#[derive(Default)]
pub struct UsageLedger {
    records: Vec<UsageRecord>,
    limits: HashMap<String, BudgetLimits>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_limits(&mut self, provider: impl Into<String>, limits: BudgetLimits) {
        self.limits.insert(provider.into(), limits);
    }

    /// Rejects the call up front if the provider's daily or monthly spend
    /// already meets or exceeds its configured cap.
    pub fn check_budget(&self, provider: &str, now: DateTime<Utc>) -> SwarmResult<()> {
        let Some(limits) = self.limits.get(provider) else {
            return Ok(());
        };
        if let Some(cap) = limits.daily {
            let spent = self.spent_since(provider, now - chrono::Duration::hours(24));
            if spent >= cap {
                return Err(SwarmError::BudgetExceeded {
                    provider: provider.to_string(),
                    detail: format!("daily spend {spent:.4} >= cap {cap:.4}"),
                });
            }
        }
        if let Some(cap) = limits.monthly {
            let spent = self.spent_since(provider, now - chrono::Duration::days(30));
            if spent >= cap {
                return Err(SwarmError::BudgetExceeded {
                    provider: provider.to_string(),
                    detail: format!("monthly spend {spent:.4} >= cap {cap:.4}"),
                });
            }
        }
        Ok(())
    }

    pub fn record(&mut self, record: UsageRecord) {
        self.records.push(record);
    }

    fn spent_since(&self, provider: &str, since: DateTime<Utc>) -> f64 {
        self.records
            .iter()
            .filter(|r| r.provider == provider && r.timestamp >= since)
            .map(|r| r.estimated_cost)
            .sum()
    }

    /// Aggregate snapshot: total calls, total cost, and total tokens per
    /// provider.
    pub fn summary(&self) -> HashMap<String, ProviderUsageSummary> {
        let mut out: HashMap<String, ProviderUsageSummary> = HashMap::new();
        for r in &self.records {
            let entry = out.entry(r.provider.clone()).or_default();
            entry.calls += 1;
            entry.prompt_tokens += r.prompt_tokens;
            entry.completion_tokens += r.completion_tokens;
            entry.estimated_cost += r.estimated_cost;
            entry.retries += r.retries;
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProviderUsageSummary {
    pub calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub estimated_cost: f64,
    pub retries: u32,
}
