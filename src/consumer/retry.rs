//! Bounded retry with fixed back-off for the audit append path.
//!
//! Auditing is best-effort: the consumer makes a small fixed number of
//! attempts with a short pause between them, and on exhaustion the caller
//! logs the last error and moves on. This must stay cheap: the retrier
//! runs between a successful HTTP drain and the source acknowledgement, so
//! an aggressive policy here would hold records hostage.

use std::future::Future;
use std::time::Duration;

/// Retry tuning.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub attempts: u32,

    /// Fixed pause between attempts.
    pub backoff: Duration,
}

impl RetryConfig {
    /// The audit-append policy: 3 attempts, 10 ms apart.
    pub const AUDIT: Self = RetryConfig {
        attempts: 3,
        backoff: Duration::from_millis(10),
    };
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig::AUDIT
    }
}

/// Runs `operation` until it succeeds or the attempts are exhausted,
/// returning the last error in the latter case.
pub async fn retry<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = config.attempts.max(1);
    let mut last_err = None;
    for attempt in 0..attempts {
        if attempt > 0 {
            tokio::time::sleep(config.backoff).await;
        }
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => last_err = Some(err),
        }
    }
    // attempts >= 1, so at least one error was recorded.
    Err(last_err.unwrap())
}
