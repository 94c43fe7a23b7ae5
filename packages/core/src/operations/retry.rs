//! Retry with exponential backoff for revision conflicts
//!
//! Façade operations are read-then-write sequences guarded by a revision
//! precondition on the parent path. When another writer lands in between, the
//! store rejects the batch with a conflict. Instead of failing immediately the
//! operation is re-run from a fresh snapshot, with exponential backoff.
//!
//! # Example
//!
//! ```rust
//! use pagetree_core::operations::{BlockOperationError, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), BlockOperationError> {
//! // Up to 3 retries with 10ms, 20ms, 40ms backoff
//! let policy = RetryPolicy::new(3, Duration::from_millis(10));
//! let value = policy
//!     .run("pages/homepage/components", |_attempt| async { Ok(42) })
//!     .await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

use super::BlockOperationError;
use std::future::Future;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = single attempt)
    pub max_retries: usize,
    /// Delay before the first retry; doubled for every further one
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_backoff: Duration) -> Self {
        Self {
            max_retries,
            base_backoff,
        }
    }

    /// Single attempt, conflicts surface immediately
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Delay before retry number `attempt + 1` (10ms, 20ms, 40ms, ...)
    pub fn backoff(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        self.base_backoff.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails for good or retries run out
    ///
    /// `operation` receives the zero-based attempt number and must re-read
    /// whatever state it depends on every time it is called.
    ///
    /// # Retry Behavior
    ///
    /// - **Retry on**: store revision conflicts only
    /// - **Backoff**: exponential from `base_backoff`
    /// - **Other errors**: returned immediately
    /// - **Exhausted**: `BlockOperationError::VersionConflict` naming `path`
    pub async fn run<T, F, Fut>(
        &self,
        path: &str,
        mut operation: F,
    ) -> Result<T, BlockOperationError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, BlockOperationError>>,
    {
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        tracing::debug!(
                            "Write under '{}' succeeded after {} retry(ies)",
                            path,
                            attempt
                        );
                    }
                    return Ok(value);
                }

                Err(e) if e.is_retriable() && attempt < self.max_retries => {
                    tracing::debug!(
                        "Conflict on attempt {}/{} under '{}': {}. Retrying...",
                        attempt + 1,
                        self.max_retries + 1,
                        path,
                        e
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }

                Err(e) if e.is_retriable() => {
                    tracing::warn!(
                        "Max retries ({}) exceeded for write under '{}'",
                        self.max_retries,
                        path
                    );
                    return Err(BlockOperationError::version_conflict(path, attempt + 1));
                }

                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn conflict() -> BlockOperationError {
        StoreError::conflict("p", 1, 2).into()
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(10));
        assert_eq!(policy.backoff(1), Duration::from_millis(20));
        assert_eq!(policy.backoff(2), Duration::from_millis(40));
        assert_eq!(policy.backoff(64), Duration::from_millis(10) * u32::MAX);
    }

    #[tokio::test]
    async fn test_succeeds_after_conflicts() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result = policy
            .run("p", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err(conflict())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_version_conflict() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10));
        let result: Result<(), _> = policy.run("p", |_| async { Err(conflict()) }).await;
        assert_eq!(result, Err(BlockOperationError::version_conflict("p", 3)));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .run("p", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BlockOperationError::store_unavailable("offline")) }
            })
            .await;

        assert_eq!(result, Err(BlockOperationError::store_unavailable("offline")));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let result: Result<(), _> = RetryPolicy::no_retry()
            .run("p", |_| async { Err(conflict()) })
            .await;
        assert_eq!(result, Err(BlockOperationError::version_conflict("p", 1)));
    }
}
