//! The `backstop complete` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;

use backstop_core::classify::classify;
use backstop_core::traits::CompletionRequest;
use backstop_providers::config::load_config_from;
use backstop_providers::{create_provider, ResilientProvider};

use super::classify::print_text;

pub async fn execute(
    prompt: String,
    provider_name: Option<String>,
    model: Option<String>,
    max_retries: Option<u32>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let provider_name = provider_name.unwrap_or_else(|| config.default_provider.clone());
    let Some(provider_config) = config.providers.get(&provider_name) else {
        anyhow::bail!(
            "provider '{}' not found in config. Available: {:?}",
            provider_name,
            config.providers.keys().collect::<Vec<_>>()
        );
    };

    let mut retry = config.retry.to_retry_config();
    if let Some(max_retries) = max_retries {
        retry.max_retries = max_retries;
    }

    let provider = create_provider(
        provider_config,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    let resilient = ResilientProvider::new(provider, retry);

    let request = CompletionRequest::new(model.unwrap_or(config.default_model), prompt);
    let result = resilient.complete(&request).await;
    let attempts = result.attempts;
    let total_delay_ms = result.total_delay_ms;
    let classified = result.classify();

    match result.into_result() {
        Ok(response) => {
            println!("{}", response.content);
            eprintln!(
                "{} via {provider_name}: {attempts} attempt(s), {total_delay_ms}ms waiting, {} tokens",
                response.model, response.token_usage.total_tokens
            );
            Ok(())
        }
        Err(err) => {
            let classified = classified.unwrap_or_else(|| classify(&err));
            print_text(&classified);
            anyhow::bail!(
                "completion failed after {attempts} attempt(s) ({}): {}",
                classified.category,
                classified.message
            )
        }
    }
}
