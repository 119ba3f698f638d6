use std::{future::Future, time::Duration};

use sharenote_core::{StorageError, StoreResult};

use crate::error::{PublishError, Result};

/// How often a storage call is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Attachments and theme assets.
    pub const ASSET: Self = Self {
        attempts: 4,
        delay: Duration::from_secs(1),
    };
    /// Single-shot calls such as the connection check.
    pub const BEST_EFFORT: Self = Self {
        attempts: 1,
        delay: Duration::from_secs(1),
    };

    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ASSET
    }
}

/// Runs `op` until it succeeds, is rejected, or the budget is spent.
///
/// Rejections are returned immediately. The delay is a timer, not a
/// blocking sleep, so concurrently settling items keep making progress.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, key: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err @ StorageError::Rejected { .. }) => {
                tracing::error!("{err}");
                return Err(PublishError::from_storage(key, err));
            }
            Err(err) if attempt >= attempts => {
                tracing::error!("giving up on {key} after {attempt} attempts: {err}");
                return Err(PublishError::from_storage(key, err));
            }
            Err(err) => {
                tracing::warn!(
                    "attempt {attempt}/{attempts} for {key} failed: {err}; retrying in {:?}",
                    policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn failing_until(
        succeed_on: u32,
        calls: &AtomicU32,
    ) -> impl FnMut() -> std::future::Ready<StoreResult<u32>> + '_ {
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= succeed_on {
                Ok(n)
            } else {
                Err(StorageError::transient(anyhow::anyhow!("reset")))
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_last_attempt() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();
        let result = with_retry(RetryPolicy::ASSET, "k", failing_until(4, &calls)).await;
        assert_eq!(result.unwrap(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget() {
        let calls = AtomicU32::new(0);
        let result = with_retry(RetryPolicy::ASSET, "k", failing_until(5, &calls)).await;
        assert!(matches!(
            result,
            Err(PublishError::TransientStorage { ref key, .. }) if key == "k"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn rejection_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(RetryPolicy::ASSET, "k", || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Err(StorageError::rejected("k", "forbidden")))
        })
        .await;
        assert!(matches!(
            result,
            Err(PublishError::PermanentStorage { ref reason, .. }) if reason == "forbidden"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
