use crate::{
    config::Config,
    constants::{RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS, RETRY_MAX_RETRIES},
    error::{AppError, Result},
    services::classifier,
};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

const MAX_BACKOFF_EXPONENT: u32 = 16;

pub type RetryPredicate = Arc<dyn Fn(&AppError) -> bool + Send + Sync>;

/// Retry settings for one read. Cloned per call, never shared mutably.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt; `3` means at most 4 invocations.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential: bool,
    /// Can only narrow retries: user rejection, permission and validation
    /// errors abort regardless of what this returns.
    pub is_retryable: RetryPredicate,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: RETRY_MAX_RETRIES,
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(RETRY_MAX_DELAY_MS),
            exponential: true,
            is_retryable: Arc::new(classifier::is_retryable),
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("exponential", &self.exponential)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.retry_max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            ..Self::default()
        }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = self.max_delay.max(base_delay);
        self
    }

    pub fn with_exponential(mut self, exponential: bool) -> Self {
        self.exponential = exponential;
        self
    }

    pub fn with_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&AppError) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Arc::new(predicate);
        self
    }

    /// Delay before retry number `attempt + 1`, where `attempt` starts at 0.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if !self.exponential {
            return self.base_delay.min(self.max_delay);
        }
        let multiplier = 1_u32 << attempt.min(MAX_BACKOFF_EXPONENT);
        self.base_delay
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn should_retry(&self, error: &AppError) -> bool {
        classifier::classify(error).is_retryable() && (self.is_retryable)(error)
    }
}

/// Runs `operation` until it succeeds, a non-retryable error occurs or the
/// retries are spent. The last error is returned unchanged.
pub async fn run_with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!("{} succeeded after {} retries", label, attempt);
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !policy.should_retry(&err) {
            tracing::debug!(
                "{} failed with non-retryable {} error: {}",
                label,
                err.category(),
                err
            );
            return Err(err);
        }
        if attempt >= policy.max_retries {
            tracing::warn!(
                "{} failed after {} attempts: {}",
                label,
                attempt + 1,
                err
            );
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        attempt += 1;
        tracing::warn!(
            "{} failed ({}), retry {}/{} in {:?}",
            label,
            err,
            attempt,
            policy.max_retries,
            delay
        );
        sleep(delay).await;
    }
}
