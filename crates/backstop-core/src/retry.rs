//! Retry driver.
//!
//! Runs an async operation until it succeeds, fails with something that is
//! not worth retrying, or runs out of attempts. Exhaustion is reported as a
//! [`RetryResult`] carrying the last error, never as a panic or a thrown
//! error, so callers decide how to surface it.

use std::future::Future;
use std::time::Duration;

use crate::backoff::calculate_backoff;
use crate::classify::{classify_failure, AiError, RecoveryAction};
use crate::error::RateLimitError;
use crate::failure::{Failure, Normalize};

/// Statuses retried by default. 529 is Anthropic's "overloaded".
pub const DEFAULT_RETRYABLE_STATUSES: [u16; 7] = [408, 429, 500, 502, 503, 504, 529];

/// Retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles per retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including server hints.
    pub max_delay: Duration,
    /// HTTP statuses worth retrying.
    pub retryable_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl RetryConfig {
    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }

    /// Whether `failure` deserves another attempt under this policy.
    ///
    /// The classifier must call it retryable, and a status, when present,
    /// must also be in the configured list.
    pub fn is_retryable(&self, failure: &Failure) -> bool {
        self.classify(failure).retryable
    }

    /// Classify `failure` as this policy sees it.
    ///
    /// A failure the classifier would retry but whose status is not in the
    /// list comes back non-retryable, without a wait or retry actions.
    pub fn classify(&self, failure: &Failure) -> AiError {
        let mut classified = classify_failure(failure);
        let status_allowed = failure
            .status
            .map_or(true, |status| self.is_retryable_status(status));

        if classified.retryable && !status_allowed {
            classified.retryable = false;
            classified.suggested_wait_ms = None;
            classified.recovery_actions.retain(|action| {
                !matches!(action, RecoveryAction::Retry | RecoveryAction::WaitAndRetry)
            });
            if classified.recovery_actions.is_empty() {
                classified.recovery_actions.push(RecoveryAction::ContactSupport);
            }
        }
        classified
    }
}

/// Notified before each sleep between attempts.
pub trait RetryObserver: Send + Sync {
    /// `attempt` is the 1-based attempt that just failed.
    fn on_retry(&self, attempt: u32, delay: Duration, error: &RateLimitError);
}

/// Observer that ignores every notification.
pub struct NoopObserver;

impl RetryObserver for NoopObserver {
    fn on_retry(&self, _: u32, _: Duration, _: &RateLimitError) {}
}

impl<F> RetryObserver for F
where
    F: Fn(u32, Duration, &RateLimitError) + Send + Sync,
{
    fn on_retry(&self, attempt: u32, delay: Duration, error: &RateLimitError) {
        self(attempt, delay, error)
    }
}

/// Outcome of a retry run.
#[derive(Debug, Clone)]
pub struct RetryResult<T> {
    /// The data on success, the last error otherwise.
    pub outcome: Result<T, RateLimitError>,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Total time spent sleeping between attempts.
    pub total_delay_ms: u64,
    /// Policy-aware classification of the last error.
    classified: Option<AiError>,
}

impl<T> RetryResult<T> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&RateLimitError> {
        self.outcome.as_ref().err()
    }

    /// Classification of the final error, for presenting recovery options.
    ///
    /// `retryable` agrees with the decision the driver made for this error.
    pub fn classify(&self) -> Option<AiError> {
        self.classified.clone()
    }

    pub fn into_result(self) -> Result<T, RateLimitError> {
        self.outcome
    }
}

/// Run `operation` under `config`, sleeping between failed attempts.
///
/// Each call owns its counters, so concurrent runs do not interact. To
/// cancel, drop the returned future (e.g. lose a `tokio::select!` race).
pub async fn with_retry<T, E, F, Fut>(
    mut operation: F,
    config: &RetryConfig,
    observer: Option<&dyn RetryObserver>,
) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Normalize,
{
    let mut attempts = 0u32;
    let mut total_delay = Duration::ZERO;

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(data) => {
                return RetryResult {
                    outcome: Ok(data),
                    attempts,
                    total_delay_ms: total_delay.as_millis() as u64,
                    classified: None,
                }
            }
            Err(err) => err,
        };

        let failure = err.normalize();
        let classified = config.classify(&failure);
        let retryable = classified.retryable;
        let retries_used = attempts - 1;
        let hint = failure.retry_after_ms.map(Duration::from_millis);
        let error = RateLimitError::from(failure);

        if !retryable || retries_used >= config.max_retries {
            tracing::debug!(
                attempts,
                retryable,
                status = ?error.status,
                "giving up: {}",
                error.message
            );
            return RetryResult {
                outcome: Err(error),
                attempts,
                total_delay_ms: total_delay.as_millis() as u64,
                classified: Some(classified),
            };
        }

        let delay = calculate_backoff(retries_used, config.base_delay, config.max_delay, hint);
        tracing::warn!(
            attempt = attempts,
            max_retries = config.max_retries,
            delay_ms = delay.as_millis() as u64,
            status = ?error.status,
            "attempt failed, retrying: {}",
            error.message
        );
        if let Some(observer) = observer {
            observer.on_retry(attempts, delay, &error);
        }

        tokio::time::sleep(delay).await;
        total_delay += delay;
    }
}
