//! Retry and classification around any provider.

use std::sync::Arc;

use tracing::instrument;

use backstop_core::classify::{classify, AiError};
use backstop_core::retry::{with_retry, RetryConfig, RetryObserver, RetryResult};
use backstop_core::traits::{AiProvider, CompletionRequest, CompletionResponse};

/// Wraps an [`AiProvider`] with the retry driver.
pub struct ResilientProvider {
    inner: Arc<dyn AiProvider>,
    config: RetryConfig,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl ResilientProvider {
    pub fn new(inner: Arc<dyn AiProvider>, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            observer: None,
        }
    }

    /// Notify `observer` before every retry sleep.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Complete `request`, retrying transient failures.
    #[instrument(skip(self, request), fields(provider = %self.inner.name(), model = %request.model))]
    pub async fn complete(&self, request: &CompletionRequest) -> RetryResult<CompletionResponse> {
        let result = with_retry(
            || self.inner.complete(request),
            &self.config,
            self.observer.as_deref(),
        )
        .await;

        if result.is_success() {
            tracing::debug!(
                attempts = result.attempts,
                total_delay_ms = result.total_delay_ms,
                "completion succeeded"
            );
        }
        result
    }

    /// Complete `request`, or explain the failure with recovery options.
    pub async fn complete_or_recover(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AiError> {
        let result = self.complete(request).await;
        let attempts = result.attempts;
        let classified = result.classify();
        result.into_result().map_err(|err| {
            let classified = classified.unwrap_or_else(|| classify(&err));
            tracing::warn!(
                provider = %self.inner.name(),
                attempts,
                category = %classified.category,
                "completion failed: {}",
                classified.message
            );
            classified
        })
    }
}
