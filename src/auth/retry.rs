//! Opt-in bounded retry with exponential backoff
//!
//! The core never retries on its own; callers wrap individual operations
//! (currently the session refresh endpoint) with this helper.

use std::future::Future;
use std::time::Duration;

/// Bounded exponential backoff parameters
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

/// Run an operation with bounded exponential backoff and random jitter.
/// Returns the first success, or the last error once attempts are exhausted.
pub async fn with_backoff<T, E, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1u32;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempt >= policy.max_attempts.max(1) {
                    return Err(e);
                }
                tracing::warn!(
                    "Attempt {}/{} failed: {}, retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    e,
                    delay
                );

                let jitter_ceiling = (delay.as_millis() as u64 / 2).max(1);
                let jitter = Duration::from_millis(fastrand::u64(0..jitter_ceiling));
                tokio::time::sleep(delay + jitter).await;

                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
        }
    }
}
