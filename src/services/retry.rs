//! Bounded exponential backoff for transient remote failures.

use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// Errors that know whether trying again could help.
pub trait RetryableError {
    fn is_retryable(&self) -> bool;
}

fn calculate_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exponential = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
    let capped = exponential.min(cfg.max_delay.as_secs_f64());

    let delay = if cfg.jitter {
        capped * (0.5 + fastrand::f64())
    } else {
        capped
    };

    Duration::from_secs_f64(delay)
}

/// Run `f` until it succeeds, fails with a non-retryable error, or the attempt budget is spent.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    retry_if(cfg, f, |err: &E| err.is_retryable()).await
}

/// Like [`retry`], with the caller deciding which errors are worth another attempt.
pub async fn retry_if<F, Fut, T, E, P>(
    cfg: &RetryConfig,
    mut f: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;

                if !should_retry(&err) {
                    tracing::debug!(error = %err, attempt, "Non-retryable error");
                    return Err(err);
                }

                if attempt >= cfg.max_attempts {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        max_attempts = cfg.max_attempts,
                        "Retry budget exhausted"
                    );
                    return Err(err);
                }

                let delay = calculate_delay(cfg, attempt - 1);
                tracing::warn!(
                    error = %err,
                    attempt,
                    max_attempts = cfg.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient error, retrying"
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
