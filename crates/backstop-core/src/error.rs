//! Error types.
//!
//! `ProviderError` represents failures when talking to an AI backend.
//! `RateLimitError` is the final, normalized error a retry run reports once
//! it stops retrying. Both live in `backstop-core` so the retry driver and
//! the classifier can downcast them out of `anyhow` chains without string
//! matching.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::failure::{Failure, Normalize};

/// Errors that can occur when interacting with an AI provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited{}", .retry_after_ms.map(|ms| format!(", retry after {ms}ms")).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The requested model was not found.
    #[error("model not found: {0}")]
    ModelNotFound(String),

    /// The prompt does not fit the model's context window.
    #[error("context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// The API returned an error response.
    #[error("API error (status: {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        retry_after_ms: Option<u64>,
    },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The response body could not be decoded.
    #[error("failed to parse response body: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::AuthenticationFailed(_)
            | ProviderError::ModelNotFound(_)
            | ProviderError::ContextLengthExceeded(_) => true,
            ProviderError::ApiError { status, .. } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }

    /// The HTTP status this error corresponds to, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::RateLimited { .. } => Some(429),
            ProviderError::AuthenticationFailed(_) => Some(401),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::ContextLengthExceeded(_) => Some(400),
            ProviderError::ApiError { status, .. } => Some(*status),
            ProviderError::Timeout(_)
            | ProviderError::NetworkError(_)
            | ProviderError::InvalidResponse(_) => None,
        }
    }

    /// Returns the retry-after delay in milliseconds, if the server sent one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            ProviderError::RateLimited { retry_after_ms }
            | ProviderError::ApiError { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}

impl Normalize for ProviderError {
    fn normalize(&self) -> Failure {
        Failure {
            status: self.status(),
            retry_after_ms: self.retry_after_ms(),
            message: self.to_string(),
        }
    }
}

/// The error a retry run ends with, once it is exhausted or hits a
/// non-retryable failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct RateLimitError {
    /// HTTP status of the last failure, when one was known.
    pub status: Option<u16>,
    /// Server wait hint attached to the last failure.
    pub retry_after_ms: Option<u64>,
    /// Message of the last failure.
    pub message: String,
    /// `true` when the last failure was a 429.
    pub is_rate_limited: bool,
}

impl From<Failure> for RateLimitError {
    fn from(failure: Failure) -> Self {
        Self {
            is_rate_limited: failure.is_rate_limited(),
            status: failure.status,
            retry_after_ms: failure.retry_after_ms,
            message: failure.message,
        }
    }
}

impl Normalize for RateLimitError {
    fn normalize(&self) -> Failure {
        Failure {
            // The flag can be set on records built by hand without a status.
            status: self.status.or(self.is_rate_limited.then_some(429)),
            retry_after_ms: self.retry_after_ms,
            message: self.message.clone(),
        }
    }
}
