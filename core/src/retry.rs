//! Bounded retry for model calls. Every call site gets at most one extra
//! attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::ModelError;

pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retry every failure, not only transient ones.
    pub retry_all: bool,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn transient_only() -> Self {
        Self { retry_all: false, delay: DEFAULT_RETRY_DELAY }
    }

    pub const fn any_failure() -> Self {
        Self { retry_all: true, delay: DEFAULT_RETRY_DELAY }
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn should_retry(&self, err: &ModelError) -> bool {
        self.retry_all || err.is_transient()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::transient_only()
    }
}

/// Run `op`, and run it once more if the first failure qualifies under
/// `policy`. The second outcome is returned as-is.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, ModelError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ModelError>>,
{
    match op().await {
        Ok(value) => Ok(value),
        Err(err) if policy.should_retry(&err) => {
            tracing::warn!("{label} failed ({err}); retrying once");
            if !policy.delay.is_zero() {
                tokio::time::sleep(policy.delay).await;
            }
            op().await
        }
        Err(err) => Err(err),
    }
}
