// src/services/poller.rs
use crate::errors::GenerationError;
use crate::models::Provider;
use log::{debug, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365);

#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        // Zero interval would turn the loop into a busy spin.
        let interval = interval.max(Duration::from_millis(1));
        Self { interval, max_wait }
    }

    pub fn max_cycles(&self) -> u32 {
        let interval = self.interval.as_millis().max(1);
        let cycles = self.max_wait.as_millis().div_ceil(interval);
        cycles.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(600))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationState<T> {
    Pending,
    Done(T),
}

/// Waits on a submitted long-running operation until it reports completion.
///
/// `initial` is the state returned by the submission call. Every cycle sleeps
/// one interval and then calls `query`. `max_wait` is a wall-clock deadline
/// covering both the sleeps and the queries themselves; a query still in
/// flight at the deadline is abandoned. Transient query failures count as a
/// pending cycle. Running out of time yields [`GenerationError::Timeout`].
pub async fn poll_operation<T, F, Fut>(
    policy: &PollPolicy,
    provider: Provider,
    initial: OperationState<T>,
    mut query: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<OperationState<T>, GenerationError>>,
{
    let started = Instant::now();
    let deadline = started
        .checked_add(policy.max_wait)
        .unwrap_or_else(|| started + FAR_FUTURE);
    let max_cycles = policy.max_cycles();
    let timed_out = || GenerationError::Timeout {
        provider,
        waited_secs: started.elapsed().as_secs(),
    };
    let mut state = initial;
    let mut cycles = 0;

    loop {
        if let OperationState::Done(value) = state {
            return Ok(value);
        }
        if cycles >= max_cycles || Instant::now() >= deadline {
            return Err(timed_out());
        }

        let wake = Instant::now()
            .checked_add(policy.interval)
            .map_or(deadline, |at| at.min(deadline));
        tokio::time::sleep_until(wake).await;
        cycles += 1;
        debug!("{} operation poll {}/{}", provider, cycles, max_cycles);

        state = match tokio::time::timeout_at(deadline, query()).await {
            Err(_) => return Err(timed_out()),
            Ok(Ok(next)) => next,
            Ok(Err(error)) if error.is_retryable() => {
                warn!("{} status query failed, will poll again: {}", provider, error);
                OperationState::Pending
            }
            Ok(Err(error)) => return Err(error),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_wait_ms: u64) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(max_wait_ms))
    }

    #[tokio::test]
    async fn two_pending_reports_take_two_cycles() {
        // Submission reports not-done, first query not-done, second query done.
        let queries = AtomicU32::new(0);
        let result = poll_operation(&fast(1000), Provider::Gemini, OperationState::Pending, || {
            let n = queries.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(OperationState::Pending)
                } else {
                    Ok(OperationState::Done("video"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "video");
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn already_done_never_queries() {
        let queries = AtomicU32::new(0);
        let result = poll_operation(&fast(10), Provider::OpenAI, OperationState::Done(7), || {
            queries.fetch_add(1, Ordering::SeqCst);
            async { Ok(OperationState::Pending) }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn budget_exhaustion_times_out() {
        let queries = AtomicU32::new(0);
        let result: Result<(), _> =
            poll_operation(&fast(5), Provider::Gemini, OperationState::Pending, || {
                queries.fetch_add(1, Ordering::SeqCst);
                async { Ok(OperationState::Pending) }
            })
            .await;

        assert!(matches!(result, Err(GenerationError::Timeout { .. })));
        let queries = queries.load(Ordering::SeqCst);
        assert!((1..=5).contains(&queries), "{queries} queries");
    }

    #[tokio::test]
    async fn slow_queries_count_against_the_budget() {
        let policy = PollPolicy::new(Duration::from_millis(1), Duration::from_millis(20));
        let started = std::time::Instant::now();
        let result: Result<(), _> =
            poll_operation(&policy, Provider::Gemini, OperationState::Pending, || async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok(OperationState::Pending)
            })
            .await;

        assert!(matches!(result, Err(GenerationError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(250));
    }

    #[tokio::test]
    async fn timeout_reports_real_elapsed_seconds() {
        let policy = PollPolicy::new(Duration::from_millis(400), Duration::from_millis(1100));
        let result: Result<(), _> =
            poll_operation(&policy, Provider::OpenAI, OperationState::Pending, || async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Ok(OperationState::Pending)
            })
            .await;

        match result {
            Err(GenerationError::Timeout { waited_secs, .. }) => assert_eq!(waited_secs, 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn transient_query_error_keeps_polling() {
        let queries = AtomicU32::new(0);
        let result = poll_operation(&fast(100), Provider::Gemini, OperationState::Pending, || {
            let n = queries.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(GenerationError::ProviderUnreachable {
                        provider: Provider::Gemini,
                        message: "503".to_string(),
                    })
                } else {
                    Ok(OperationState::Done(()))
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_query_error_stops_immediately() {
        let result: Result<(), _> =
            poll_operation(&fast(100), Provider::Gemini, OperationState::Pending, || async {
                Err(GenerationError::ContentBlocked {
                    provider: Provider::Gemini,
                    reason: "filtered".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(GenerationError::ContentBlocked { .. })));
    }

    #[test]
    fn zero_interval_is_clamped() {
        let policy = PollPolicy::new(Duration::ZERO, Duration::from_millis(3));
        assert_eq!(policy.interval, Duration::from_millis(1));
        assert_eq!(policy.max_cycles(), 3);
        assert_eq!(PollPolicy::default().max_cycles(), 120);
    }
}
