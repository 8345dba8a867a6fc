//! Bounded retry with exponential backoff for gateway calls.

use crate::error::GatewayError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry settings as they appear in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per call, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

/// Retry policy applied around each individual gateway call
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier.max(1.0),
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_attempts` times with no waiting in between.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Wait before attempt `attempt + 1`, given that attempt `attempt` (1-based) failed.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    /// Backoff for `attempt`, raised to the provider's retry-after hint, capped at `max_backoff`.
    pub fn delay_for(&self, attempt: u32, error: &GatewayError) -> Duration {
        let base = self.backoff_for(attempt);
        match error.retry_after() {
            Some(hint) => base.max(hint).min(self.max_backoff.max(base)),
            None => base,
        }
    }

    /// Run `op` until it succeeds, fails unrecoverably, or attempts run out.
    ///
    /// Returns the final result and the number of attempts made. `on_retry` is
    /// called before each wait with the failed attempt number, the error and the delay.
    pub async fn run<T, F, Fut, R>(&self, mut op: F, mut on_retry: R) -> (Result<T, GatewayError>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
        R: FnMut(u32, &GatewayError, Duration),
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if err.is_recoverable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt, &err);
                    on_retry(attempt, &err, delay);
                    if !delay.is_zero() {
                        sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(err) => return (Err(err), attempt),
            }
        }
    }
}
