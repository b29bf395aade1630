//! backstop-providers: AI provider integrations.
//!
//! Implements the `AiProvider` trait for Anthropic and OpenAI, plus a
//! scripted provider for offline use, and wraps any of them with the retry
//! driver from `backstop-core`.

pub mod anthropic;
pub mod config;
mod http;
pub mod mock;
pub mod openai;
pub mod resilient;

pub use config::{create_provider, load_config, BackstopConfig, ProviderConfig, RetrySettings};
pub use resilient::ResilientProvider;
