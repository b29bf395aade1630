//! Normalization of error shapes.
//!
//! Errors reach the retry driver and the classifier in many shapes: provider
//! enums, finished retry errors, `anyhow` chains, transport errors, bare
//! strings. Each is reduced once to a [`Failure`] carrying the status, the
//! server wait hint and the message, and nothing downstream branches on the
//! original shape again.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, RateLimitError};

/// A failed attempt, reduced to the fields retry and classification need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// HTTP status, structured or recovered from the message.
    pub status: Option<u16>,
    /// Server wait hint in milliseconds.
    pub retry_after_ms: Option<u64>,
    /// Human-readable error message.
    pub message: String,
}

impl Failure {
    /// A failure known only by its message. A status embedded in the text
    /// (`"status: 503"`, `"HTTP 429"`) is recovered best-effort.
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: extract_status(&message),
            retry_after_ms: None,
            message,
        }
    }

    /// A failure with a structured status.
    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            retry_after_ms: None,
            message: message.into(),
        }
    }

    /// Attach a server wait hint.
    pub fn retry_after_ms(mut self, ms: u64) -> Self {
        self.retry_after_ms = Some(ms);
        self
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == Some(429)
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Failure {}

/// Conversion of an error shape into a [`Failure`].
pub trait Normalize {
    fn normalize(&self) -> Failure;
}

impl Normalize for Failure {
    fn normalize(&self) -> Failure {
        self.clone()
    }
}

impl Normalize for str {
    fn normalize(&self) -> Failure {
        Failure::new(self)
    }
}

impl Normalize for String {
    fn normalize(&self) -> Failure {
        Failure::new(self.as_str())
    }
}

impl<T: Normalize + ?Sized> Normalize for &T {
    fn normalize(&self) -> Failure {
        (**self).normalize()
    }
}

impl Normalize for std::io::Error {
    fn normalize(&self) -> Failure {
        Failure::new(self.to_string())
    }
}

impl Normalize for tokio::time::error::Elapsed {
    fn normalize(&self) -> Failure {
        Failure::new("request timed out")
    }
}

impl Normalize for anyhow::Error {
    /// Walks the cause chain for a structured shape before falling back to
    /// the rendered message.
    fn normalize(&self) -> Failure {
        for cause in self.chain() {
            if let Some(failure) = cause.downcast_ref::<Failure>() {
                return failure.clone();
            }
            if let Some(err) = cause.downcast_ref::<ProviderError>() {
                return err.normalize();
            }
            if let Some(err) = cause.downcast_ref::<RateLimitError>() {
                return err.normalize();
            }
            if let Some(err) = cause.downcast_ref::<tokio::time::error::Elapsed>() {
                return err.normalize();
            }
        }
        Failure::new(format!("{self:#}"))
    }
}

fn status_pattern() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"(?i)\b(?:status(?:\s+code)?|http)\s*[:=]?\s*([1-5]\d{2})\b")
            .expect("status regex is valid")
    })
}

/// Recover an HTTP status code embedded in free text.
pub fn extract_status(message: &str) -> Option<u16> {
    status_pattern()
        .captures(message)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_embedded_status() {
        assert_eq!(extract_status("Request failed with status: 429"), Some(429));
        assert_eq!(extract_status("status 503 from upstream"), Some(503));
        assert_eq!(extract_status("HTTP 401 Unauthorized"), Some(401));
        assert_eq!(extract_status("status code 500"), Some(500));
        assert_eq!(extract_status("STATUS=400"), Some(400));
    }

    #[test]
    fn ignores_unrelated_numbers() {
        assert_eq!(extract_status("retry in 429 seconds"), None);
        assert_eq!(extract_status("status: 999"), None);
        assert_eq!(extract_status("status: 4290"), None);
        assert_eq!(extract_status("no numbers here"), None);
    }

    #[test]
    fn plain_message_normalizes() {
        let failure = "fetch failed".normalize();
        assert_eq!(failure.status, None);
        assert_eq!(failure.message, "fetch failed");

        let failure = String::from("API error (status: 502): bad gateway").normalize();
        assert_eq!(failure.status, Some(502));
    }

    #[test]
    fn anyhow_chain_finds_structured_error() {
        let err = anyhow::Error::new(ProviderError::RateLimited {
            retry_after_ms: Some(2000),
        })
        .context("completing prompt");
        let failure = err.normalize();
        assert_eq!(failure.status, Some(429));
        assert_eq!(failure.retry_after_ms, Some(2000));
    }

    #[test]
    fn anyhow_without_structure_uses_message() {
        let err = anyhow::anyhow!("upstream said status: 503").context("calling backend");
        let failure = err.normalize();
        assert_eq!(failure.status, Some(503));
        assert!(failure.message.starts_with("calling backend"));
    }

    #[test]
    fn io_error_keeps_message() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        assert_eq!(err.normalize().message, "connection refused");
    }

    #[tokio::test]
    async fn elapsed_reads_as_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();
        assert!(elapsed.normalize().message.contains("timed out"));
    }

    #[test]
    fn builder_attaches_hint() {
        let failure = Failure::with_status(429, "slow down").retry_after_ms(3000);
        assert!(failure.is_rate_limited());
        assert_eq!(failure.retry_after_ms, Some(3000));
    }
}
