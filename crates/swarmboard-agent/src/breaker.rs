//! Per-provider circuit breaker (§4.9 layer 3).

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Tracks consecutive failures for one provider and gates whether a call is
/// admitted.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    threshold: u32,
    cooldown_seconds: i64,
    opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown_seconds: i64) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            threshold,
            cooldown_seconds,
            opened_at: None,
        }
    }

    /// Whether a call may be admitted right now. `OPEN` transitions itself
    /// to `HALF_OPEN` once the cooldown has elapsed, admitting exactly the
    /// next call as a probe.
    pub fn allow_call(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let elapsed = self.opened_at.map(|t| (now - t).num_seconds()).unwrap_or(0);
                if elapsed >= self.cooldown_seconds {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn on_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    pub fn on_failure(&mut self, now: DateTime<Utc>) {
        match self.state {
            BreakerState::HalfOpen => {
                self.state = BreakerState::Open;
                self.opened_at = Some(now);
            }
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.threshold {
                    self.state = BreakerState::Open;
                    self.opened_at = Some(now);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let now = Utc::now();
        let mut breaker = CircuitBreaker::new(3, 120);
        breaker.on_failure(now);
        breaker.on_failure(now);
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.on_failure(now);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn open_fast_fails_until_cooldown_elapses() {
        let now = Utc::now();
        let mut breaker = CircuitBreaker::new(1, 120);
        breaker.on_failure(now);
        assert!(!breaker.allow_call(now + Duration::seconds(10)));
        assert!(breaker.allow_call(now + Duration::seconds(121)));
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_probe_failure_reopens_and_restarts_cooldown() {
        let now = Utc::now();
        let mut breaker = CircuitBreaker::new(1, 120);
        breaker.on_failure(now);
        breaker.allow_call(now + Duration::seconds(121));
        breaker.on_failure(now + Duration::seconds(121));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(!breaker.allow_call(now + Duration::seconds(130)));
    }

    #[test]
    fn half_open_probe_success_closes() {
        let now = Utc::now();
        let mut breaker = CircuitBreaker::new(1, 120);
        breaker.on_failure(now);
        breaker.allow_call(now + Duration::seconds(121));
        breaker.on_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
