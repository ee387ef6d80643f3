// src/services/retry.rs
use crate::errors::GenerationError;
use log::warn;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// attempt=1 -> base*2, attempt=2 -> base*4, attempt=3 -> base*8.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.min(16);
        self.base_delay.saturating_mul(1_u32 << exponent)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }
}

/// Runs `attempt` until it succeeds, fails permanently, or runs out of attempts.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut attempt: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut current = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_retryable() && current < policy.max_attempts => {
                let delay = policy.delay_for(current);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {} ms.",
                    label,
                    current,
                    policy.max_attempts,
                    error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                current += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
