//! Retry Logic and Error Resilience
//!
//! Transient transport failures (HTTP 5xx, timeouts, network errors) are
//! retried with a linearly increasing delay. Everything else fails on the
//! first attempt: a 401 will not start working on its own, and a
//! protocol-level error object is the server's final answer.
//!
//! # Example
//!
//! ```ignore
//! use opscenter_client::mcp::retry::{RetryConfig, retry_with_backoff};
//!
//! let config = RetryConfig::default()
//!     .max_attempts(3)
//!     .backoff(Duration::from_millis(500));
//!
//! let reply = retry_with_backoff(&config, |attempt| async move {
//!     transport.send(&target, &request.with_id(next_id())).await
//! }).await?;
//! ```

use crate::mcp::transport::TransportError;
use crate::metrics;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
///
/// * `max_attempts` - total attempts including the first (default: 3)
/// * `backoff` - delay unit; the wait before attempt `n + 1` is `n * backoff`
///   (default: 500ms)
/// * `max_delay` - cap on a single wait (default: 5s)
/// * `jitter` - random extra delay as a fraction of the computed wait
///   (default: 0.0)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub backoff: Duration,
    pub max_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            jitter: 0.0,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly one attempt. Used by diagnostics, which must report what a
    /// single real request does.
    pub fn none() -> Self {
        Self::default().max_attempts(1)
    }

    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn backoff(mut self, delay: Duration) -> Self {
        self.backoff = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Jitter factor, clamped to 0.0..=1.0
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay after the failed attempt `attempt` (0-based)
    ///
    /// Linear: `backoff * (attempt + 1)`, plus jitter, capped at `max_delay`.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let multiplier = u32::try_from(attempt + 1).unwrap_or(u32::MAX);
        let linear = self.backoff.saturating_mul(multiplier);

        let jittered = if self.jitter > 0.0 {
            linear.saturating_add(linear.mul_f64(self.jitter * rand::random::<f64>()))
        } else {
            linear
        };

        jittered.min(self.max_delay)
    }

    pub fn should_retry(&self, error: &TransportError) -> bool {
        error.is_transient()
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
///
/// The closure receives the 0-based attempt number and must build a fresh
/// request each time (the caller assigns a new identifier per attempt).
pub async fn retry_with_backoff<F, T, Fut>(
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded on attempt {}", attempt + 1);
                }
                return Ok(result);
            }
            Err(e) if attempt + 1 < attempts && config.should_retry(&e) => {
                let delay = config.calculate_delay(attempt);
                tracing::warn!(
                    "Attempt {} failed: {}, retrying after {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                metrics::RPC_RETRIES_TOTAL.inc();
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if config.should_retry(&e) {
                    tracing::warn!("Giving up after {} attempts: {}", attempt + 1, e);
                } else {
                    tracing::debug!("Not retrying permanent error: {}", e);
                }
                return Err(e);
            }
        }
    }
}
