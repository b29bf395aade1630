//! The `backstop init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("backstop.toml").exists() {
        println!("backstop.toml already exists, skipping.");
    } else {
        std::fs::write("backstop.toml", SAMPLE_CONFIG)?;
        println!("Created backstop.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit backstop.toml with your API keys");
    println!("  2. Run: backstop backoff --attempts 5");
    println!("  3. Run: backstop complete --prompt \"Describe the login flow\"");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# backstop configuration

default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
request_timeout_secs = 120

[retry]
max_retries = 3
base_delay_ms = 1000
max_delay_ms = 60000
retryable_statuses = [408, 429, 500, 502, 503, 504, 529]

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

# Offline provider for trying out retries: fails with each status once,
# then answers.
[providers.offline]
type = "scripted"
failures = [429, 503]
response = "REQ-1: The system shall retry transient failures."
"#;
