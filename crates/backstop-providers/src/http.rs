//! HTTP response handling shared by the provider adapters.

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Response;
use serde::Deserialize;

use backstop_core::classify::{classify_failure, ErrorCategory};
use backstop_core::retry_after::parse_retry_after_ms;
use backstop_core::{Failure, ProviderError};

/// `{"error": {"message": ..., "type": ..., "code": ...}}`, the envelope both
/// Anthropic and OpenAI use for error bodies.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Map a transport failure from reqwest.
pub(crate) fn transport_error(err: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::NetworkError(err.to_string())
    }
}

/// Read the `retry-after` header, in either of its forms.
pub(crate) fn retry_after_header(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after_ms)
}

/// Turn a non-success response into a [`ProviderError`].
pub(crate) async fn error_for_response(response: Response, model: &str) -> ProviderError {
    let status = response.status().as_u16();
    let retry_after_ms = retry_after_header(response.headers());
    let body = response.text().await.unwrap_or_default();

    let (message, marker) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => {
            let marker = envelope
                .error
                .code
                .or(envelope.error.kind)
                .unwrap_or_default();
            (envelope.error.message, marker)
        }
        Err(_) => (body, String::new()),
    };

    tracing::debug!(status, ?retry_after_ms, %marker, "provider returned error: {message}");

    match status {
        429 => ProviderError::RateLimited { retry_after_ms },
        401 | 403 => ProviderError::AuthenticationFailed(message),
        404 => ProviderError::ModelNotFound(model.to_string()),
        400 | 413 if is_context_overflow(&message, &marker) => {
            ProviderError::ContextLengthExceeded(message)
        }
        _ => ProviderError::ApiError {
            status,
            message,
            retry_after_ms,
        },
    }
}

fn is_context_overflow(message: &str, marker: &str) -> bool {
    marker.contains("context_length")
        || classify_failure(&Failure::new(message)).category == ErrorCategory::ContextLength
}
