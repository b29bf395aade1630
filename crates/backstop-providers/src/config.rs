//! Configuration and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use backstop_core::retry::{RetryConfig, DEFAULT_RETRYABLE_STATUSES};
use backstop_core::traits::AiProvider;
use backstop_core::ProviderError;

use crate::anthropic::AnthropicProvider;
use crate::mock::ScriptedProvider;
use crate::openai::OpenAiProvider;

/// Configuration for a single AI provider.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    /// Offline provider: fails with each status in `failures` once, then
    /// answers with `response`.
    Scripted {
        #[serde(default)]
        failures: Vec<u16>,
        #[serde(default)]
        response: String,
    },
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic {
                api_key: _,
                base_url,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Scripted { failures, response } => f
                .debug_struct("Scripted")
                .field("failures", failures)
                .field("response", response)
                .finish(),
        }
    }
}

/// The `[retry]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first retry in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Ceiling for any single delay in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// HTTP statuses worth retrying.
    #[serde(default = "default_retryable_statuses")]
    pub retryable_statuses: Vec<u16>,
}

fn default_retries() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    60_000
}
fn default_retryable_statuses() -> Vec<u16> {
    DEFAULT_RETRYABLE_STATUSES.to_vec()
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            retryable_statuses: default_retryable_statuses(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            retryable_statuses: self.retryable_statuses.clone(),
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.base_delay_ms > 0, "retry.base_delay_ms must be positive");
        anyhow::ensure!(
            self.base_delay_ms <= self.max_delay_ms,
            "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            self.base_delay_ms,
            self.max_delay_ms
        );
        Ok(())
    }
}

/// Top-level backstop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackstopConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Default provider to use.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Default model to use.
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_provider() -> String {
    "anthropic".to_string()
}
fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}
fn default_timeout() -> u64 {
    120
}

impl Default for BackstopConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            request_timeout_secs: default_timeout(),
            retry: RetrySettings::default(),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
///
/// Substituted values are not rescanned.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Resolve env vars in a provider config.
fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
            org_id: org_id.as_ref().map(|o| resolve_env_vars(o)),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_ref().map(|u| resolve_env_vars(u)),
        },
        ProviderConfig::Scripted { .. } => config.clone(),
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `backstop.toml` in the current directory
/// 2. `~/.config/backstop/config.toml`
///
/// Environment variable overrides: `BACKSTOP_OPENAI_KEY`, `BACKSTOP_ANTHROPIC_KEY`.
pub fn load_config() -> Result<BackstopConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<BackstopConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("backstop.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<BackstopConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => BackstopConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("BACKSTOP_ANTHROPIC_KEY") {
        config
            .providers
            .entry("anthropic".into())
            .or_insert(ProviderConfig::Anthropic {
                api_key: String::new(),
                base_url: None,
            });
        if let Some(ProviderConfig::Anthropic { api_key, .. }) =
            config.providers.get_mut("anthropic")
        {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("BACKSTOP_OPENAI_KEY") {
        config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
            });
        if let Some(ProviderConfig::OpenAI { api_key, .. }) = config.providers.get_mut("openai") {
            *api_key = key;
        }
    }

    // Resolve env vars in all provider configs
    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();

    config.retry.validate()?;

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("backstop"))
}

/// Map a configured failure status to the error a real backend would raise.
fn scripted_failure(status: u16) -> ProviderError {
    match status {
        429 => ProviderError::RateLimited {
            retry_after_ms: None,
        },
        401 | 403 => ProviderError::AuthenticationFailed(format!("scripted status {status}")),
        _ => ProviderError::ApiError {
            status,
            message: format!("scripted failure with status {status}"),
            retry_after_ms: None,
        },
    }
}

/// Create a provider instance from its configuration.
pub fn create_provider(
    config: &ProviderConfig,
    request_timeout: Duration,
) -> Result<Arc<dyn AiProvider>> {
    let provider: Arc<dyn AiProvider> = match config {
        ProviderConfig::Anthropic { api_key, base_url } => Arc::new(AnthropicProvider::new(
            api_key,
            base_url.clone(),
            request_timeout,
        )?),
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => Arc::new(OpenAiProvider::new(
            api_key,
            base_url.clone(),
            org_id.clone(),
            request_timeout,
        )?),
        ProviderConfig::Scripted { failures, response } => Arc::new(ScriptedProvider::failing_then(
            failures.iter().copied().map(scripted_failure),
            response,
        )),
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_BACKSTOP_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_BACKSTOP_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_BACKSTOP_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_BACKSTOP_TEST_VAR");
    }

    #[test]
    fn resolve_env_vars_does_not_rescan_values() {
        std::env::set_var("_BACKSTOP_SELF_REF", "a${_BACKSTOP_SELF_REF}b");
        assert_eq!(
            resolve_env_vars("x${_BACKSTOP_SELF_REF}y"),
            "xa${_BACKSTOP_SELF_REF}by"
        );
        std::env::remove_var("_BACKSTOP_SELF_REF");

        assert_eq!(resolve_env_vars("${_BACKSTOP_UNSET_VAR}-key"), "-key");
        assert_eq!(resolve_env_vars("open ${NEVER_CLOSED"), "open ${NEVER_CLOSED");
    }

    #[test]
    fn default_config() {
        let config = BackstopConfig::default();
        assert_eq!(config.default_provider, "anthropic");
        assert_eq!(config.retry.max_retries, 3);
        let retry = config.retry.to_retry_config();
        assert_eq!(retry.base_delay, Duration::from_secs(1));
        assert_eq!(retry.max_delay, Duration::from_secs(60));
        assert!(retry.is_retryable_status(429));
        assert!(!retry.is_retryable_status(400));
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_provider = "openai"
default_model = "gpt-4.1"
request_timeout_secs = 30

[retry]
max_retries = 5
base_delay_ms = 250
retryable_statuses = [429, 503]

[providers.anthropic]
type = "anthropic"
api_key = "sk-test"

[providers.openai]
type = "openai"
api_key = "sk-openai"

[providers.offline]
type = "scripted"
failures = [429, 503]
response = "REQ-1"
"#;
        let config: BackstopConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert_eq!(config.default_provider, "openai");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.max_delay_ms, 60_000);
        assert_eq!(config.retry.retryable_statuses, vec![429, 503]);
        assert!(matches!(
            config.providers.get("offline"),
            Some(ProviderConfig::Scripted { failures, .. }) if failures == &vec![429, 503]
        ));
    }

    #[test]
    fn debug_masks_keys() {
        let config = ProviderConfig::Anthropic {
            api_key: "sk-very-secret".into(),
            base_url: None,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn load_explicit_file_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backstop.toml");
        std::fs::write(&path, "[retry]\nbase_delay_ms = 5000\nmax_delay_ms = 1000\n").unwrap();
        let err = load_config_from(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        std::fs::write(&path, "[retry]\nmax_retries = 1\n").unwrap();
        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.retry.max_retries, 1);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config_from(Some(Path::new("/nonexistent/backstop.toml"))).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[tokio::test]
    async fn scripted_provider_from_config() {
        use backstop_core::traits::CompletionRequest;

        let provider = create_provider(
            &ProviderConfig::Scripted {
                failures: vec![429],
                response: "done".into(),
            },
            Duration::from_secs(1),
        )
        .unwrap();
        let request = CompletionRequest::new("scripted-model", "x");
        let err = provider.complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(provider.complete(&request).await.unwrap().content, "done");
    }
}
