//! Bounded retries for optimistic-concurrency conflicts.

use std::future::Future;

use crate::error::{OrderingError, Result};

/// Attempts made before a conflict is reported as unavailable storage.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// How many times a conflicting write is recomputed from a fresh read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. At least one attempt is always made.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `attempt` until it returns something other than `Conflict`.
    ///
    /// Each call must redo its reads. After the last conflicting attempt the
    /// error surfaces as `StorageUnavailable`.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Err(OrderingError::Conflict(reason)) => {
                    metrics::counter!("write_conflicts_total", "operation" => operation)
                        .increment(1);
                    if tries >= self.max_attempts {
                        tracing::warn!(operation, tries, %reason, "giving up after conflicts");
                        return Err(OrderingError::StorageUnavailable(format!(
                            "{operation} kept conflicting after {tries} attempt(s): {reason}"
                        )));
                    }
                    tracing::debug!(operation, tries, %reason, "retrying after conflict");
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_success_is_returned_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = RetryPolicy::default()
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_conflict_is_retried_until_it_clears() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = RetryPolicy::new(3)
            .run("test", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(OrderingError::Conflict("lost race".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhausted_conflicts_become_unavailable() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::new(2)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OrderingError::Conflict("lost race".into()))
            })
            .await;

        assert!(matches!(result, Err(OrderingError::StorageUnavailable(_))));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = RetryPolicy::new(5)
            .run("test", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(OrderingError::NoSales)
            })
            .await;

        assert!(matches!(result, Err(OrderingError::NoSales)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0).max_attempts(), 1);
    }
}
