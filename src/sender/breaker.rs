//! Consecutive-failure circuit breaker for the outbound HTTP path.
//!
//! After a configured number of consecutive failures the circuit opens and
//! calls short-circuit to an immediate error until a cool-down has passed.
//! The first call after the cool-down is allowed through; its outcome closes
//! the circuit or re-opens it.

use std::time::{Duration, Instant};

/// Breaker tuning.
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a probe is allowed.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            failure_threshold: 10,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// Breaker state machine. Callers ask [`CircuitBreaker::allow`] before a
/// request and report the outcome with `record_success` / `record_failure`.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        CircuitBreaker {
            config,
            consecutive_failures: 0,
            opened_at: None,
        }
    }

    /// Returns true if a call may proceed.
    pub fn allow(&mut self) -> bool {
        match self.opened_at {
            None => true,
            Some(opened) => {
                if opened.elapsed() >= self.config.cooldown {
                    // Half-open: let one probe through.
                    self.opened_at = None;
                    self.consecutive_failures = self.config.failure_threshold.saturating_sub(1);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.config.failure_threshold {
            self.opened_at = Some(Instant::now());
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.opened_at, Some(opened) if opened.elapsed() < self.config.cooldown)
    }
}
