//! Retry policy and failure classification for the resilient model client
//! (§4.9 layer 2).

use rand::Rng;
use serde::{Deserialize, Serialize};
use swarmboard_core::SwarmError;

/// Tuning knobs for per-model retry with exponential backoff and jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 500,
        }
    }
}

/// `delay = min(max_delay, base_delay * 2^attempt) + U(-jitter, +jitter)`,
/// per §4.9's literal formula. Negative results are clamped to zero.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let exp = policy.base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    let capped = exp.min(policy.max_delay_ms) as i64;
    let jitter = if policy.jitter_ms == 0 {
        0
    } else {
        rand::thread_rng().gen_range(-(policy.jitter_ms as i64)..=(policy.jitter_ms as i64))
    };
    (capped + jitter).max(0) as u64
}

/// Classifies whether a [`SwarmError`] surfaced by a provider call is worth
/// retrying: network errors, 5xx, explicit rate-limit (429), and
/// malformed-response-with-repair-possible are retryable; 4xx client errors
/// (including 401/403 auth failures) and budget failures are fatal per-call —
/// an expired or invalid key will not start working on the next attempt.
pub fn is_retryable(err: &SwarmError) -> bool {
    let lower = err.to_string().to_lowercase();
    if matches!(err, SwarmError::BudgetExceeded { .. }) {
        return false;
    }
    if lower.contains("400") || lower.contains("401") || lower.contains("403") {
        return false;
    }
    lower.contains("429")
        || lower.contains("timeout")
        || lower.contains("5xx")
        || lower.contains("500")
        || lower.contains("502")
        || lower.contains("503")
        || lower.contains("504")
        || lower.contains("malformed")
}
