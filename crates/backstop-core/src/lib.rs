//! backstop-core: resilience primitives for AI requests.
//!
//! Backoff calculation, Retry-After parsing, error normalization and
//! classification, and the retry driver that ties them together. The
//! provider trait that the `backstop-providers` crate implements lives here
//! too.

pub mod backoff;
pub mod classify;
pub mod error;
pub mod failure;
pub mod retry;
pub mod retry_after;
pub mod traits;

pub use classify::{classify, AiError, ErrorCategory, RecoveryAction};
pub use error::{ProviderError, RateLimitError};
pub use failure::{Failure, Normalize};
pub use retry::{with_retry, RetryConfig, RetryObserver, RetryResult};
