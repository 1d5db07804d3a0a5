//! Eventual consistency helpers for timing-dependent checks.
//!
//! This module provides retry logic with exponential backoff for checks that
//! depend on asynchronous AWS behaviour like log ingestion or SSM command
//! delivery.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Categories of eventual consistency with documented budgets.
#[derive(Debug, Clone, Copy)]
pub enum ConsistencyCategory {
    /// CloudWatch Logs ingestion until `get-log-events` returns the event (120s)
    LogDelivery,

    /// Route53 record visibility after an apply (60s)
    DnsPropagation,

    /// SSM command delivery and execution on an instance (300s)
    RemoteCommand,

    /// IAM/KMS metadata visibility after creation (30s)
    ApiPropagation,
}

impl ConsistencyCategory {
    /// Get the maximum timeout for this consistency category.
    pub fn timeout(&self) -> Duration {
        match self {
            ConsistencyCategory::LogDelivery => Duration::from_secs(120),
            ConsistencyCategory::DnsPropagation => Duration::from_secs(60),
            ConsistencyCategory::RemoteCommand => Duration::from_secs(300),
            ConsistencyCategory::ApiPropagation => Duration::from_secs(30),
        }
    }

    /// Get the initial retry delay for exponential backoff.
    fn initial_delay(&self) -> Duration {
        Duration::from_millis(500)
    }
}

/// Assert that a condition becomes true within the timeout for the given consistency category.
///
/// Uses exponential backoff with the following strategy:
/// - Initial delay: 500ms
/// - Exponential multiplier: 2x
/// - Maximum attempts: Until timeout is reached
///
/// # Example
///
/// ```no_run
/// use cluster_tests::eventual::{assert_eventually, ConsistencyCategory};
///
/// # async fn log_event_visible() -> bool { true }
/// # async fn example() {
/// assert_eventually(ConsistencyCategory::LogDelivery, || async {
///     log_event_visible().await
/// })
/// .await
/// .expect("Log event should appear within timeout");
/// # }
/// ```
pub async fn assert_eventually<F, Fut>(
    category: ConsistencyCategory,
    mut condition: F,
) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    eventually(category, || {
        let check = condition();
        async move { check.await.then_some(()) }
    })
    .await
}

/// Poll until the probe yields a value or the category's timeout elapses.
///
/// Same backoff as [`assert_eventually`], but hands back what the probe found.
pub async fn eventually<T, F, Fut>(
    category: ConsistencyCategory,
    mut probe: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let timeout = category.timeout();
    let mut delay = category.initial_delay();
    let start = Instant::now();

    loop {
        if let Some(value) = probe().await {
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(format!(
                "Condition not met within {:?} (category: {:?})",
                timeout, category
            ));
        }

        sleep(delay).await;

        // Exponential backoff with 2x multiplier
        delay *= 2;

        // Cap delay at remaining time
        let remaining = timeout.saturating_sub(start.elapsed());
        if delay > remaining {
            delay = remaining;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_category_timeouts() {
        assert_eq!(
            ConsistencyCategory::LogDelivery.timeout(),
            Duration::from_secs(120)
        );
        assert_eq!(
            ConsistencyCategory::DnsPropagation.timeout(),
            Duration::from_secs(60)
        );
        assert_eq!(
            ConsistencyCategory::RemoteCommand.timeout(),
            Duration::from_secs(300)
        );
        assert_eq!(
            ConsistencyCategory::ApiPropagation.timeout(),
            Duration::from_secs(30)
        );
    }

    #[tokio::test]
    async fn test_assert_eventually_succeeds_immediately() {
        let result =
            assert_eventually(ConsistencyCategory::ApiPropagation, || async { true }).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_assert_eventually_succeeds_after_retry() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        let result = assert_eventually(ConsistencyCategory::ApiPropagation, move || {
            let attempts = attempts_clone.clone();
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                count >= 3
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_assert_eventually_fails_on_timeout() {
        let start = Instant::now();
        let result =
            assert_eventually(ConsistencyCategory::ApiPropagation, || async { false }).await;

        let err = result.expect_err("Should return error on timeout");
        assert!(err.contains("not met within"));
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventually_returns_probe_value() {
        let mut calls = 0;
        let value = eventually(ConsistencyCategory::LogDelivery, || {
            calls += 1;
            let ready = calls >= 2;
            async move { ready.then(|| "event-1".to_string()) }
        })
        .await
        .expect("probe should eventually succeed");

        assert_eq!(value, "event-1");
        assert_eq!(calls, 2);
    }
}
