//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn backstop() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("backstop").unwrap()
}

#[test]
fn classify_timeout_text() {
    backstop()
        .arg("classify")
        .arg("Request timed out")
        .assert()
        .success()
        .stdout(predicate::str::contains("Category:  timeout"))
        .stdout(predicate::str::contains("Retryable: yes"))
        .stdout(predicate::str::contains("retry_with_smaller_context"));
}

#[test]
fn classify_rate_limit_json_with_hint() {
    let output = backstop()
        .arg("classify")
        .arg("Too Many Requests")
        .arg("--status")
        .arg("429")
        .arg("--retry-after")
        .arg("12")
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["category"], "rate_limit");
    assert_eq!(json["retryable"], true);
    assert_eq!(json["suggested_wait_ms"], 12000);
    assert_eq!(json["recovery_actions"][0], "wait_and_retry");
}

#[test]
fn classify_auth_failure() {
    backstop()
        .arg("classify")
        .arg("invalid x-api-key")
        .arg("--status")
        .arg("401")
        .assert()
        .success()
        .stdout(predicate::str::contains("Category:  api"))
        .stdout(predicate::str::contains("Retryable: no"))
        .stdout(predicate::str::contains("Check API Key"));
}

#[test]
fn classify_embedded_status() {
    backstop()
        .arg("classify")
        .arg("Request failed with status: 400")
        .assert()
        .success()
        .stdout(predicate::str::contains("Category:  validation"));
}

#[test]
fn classify_unknown_format() {
    backstop()
        .arg("classify")
        .arg("boom")
        .arg("--format")
        .arg("xml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown format"));
}

#[test]
fn backoff_schedule_table() {
    backstop()
        .arg("backoff")
        .arg("--attempts")
        .arg("4")
        .arg("--base-ms")
        .arg("500")
        .arg("--max-ms")
        .arg("3000")
        .assert()
        .success()
        .stdout(predicate::str::contains("Jitter window"))
        .stdout(predicate::str::contains("375-625ms"))
        .stdout(predicate::str::contains("2000ms"))
        .stdout(predicate::str::contains("3000-3000ms"));
}

#[test]
fn backoff_seed_free_adds_samples() {
    // From the second retry on the jitter window sits above the cap, so the
    // sample is pinned to it.
    backstop()
        .arg("backoff")
        .arg("--attempts")
        .arg("2")
        .arg("--base-ms")
        .arg("1000")
        .arg("--max-ms")
        .arg("1000")
        .arg("--seed-free")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample"))
        .stdout(predicate::str::is_match(r"1000-1000ms\s*\S\s*1000ms").unwrap());

    backstop()
        .arg("backoff")
        .arg("--attempts")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sample").not());
}

#[test]
fn backoff_with_server_hint() {
    backstop()
        .arg("backoff")
        .arg("--attempts")
        .arg("2")
        .arg("--retry-after")
        .arg("7")
        .assert()
        .success()
        .stdout(predicate::str::contains("server hint"))
        .stdout(predicate::str::contains("7000ms"));
}

#[test]
fn backoff_rejects_bad_input() {
    backstop()
        .arg("backoff")
        .arg("--retry-after")
        .arg("whenever")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid Retry-After"));

    backstop()
        .arg("backoff")
        .arg("--base-ms")
        .arg("5000")
        .arg("--max-ms")
        .arg("1000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("exceeds max delay"));
}

#[test]
fn retry_after_values() {
    backstop()
        .arg("retry-after")
        .arg("30")
        .assert()
        .success()
        .stdout(predicate::str::contains("30000ms"));

    backstop()
        .arg("retry-after")
        .arg("garbage")
        .assert()
        .success()
        .stdout(predicate::str::contains("absent"));
}

#[test]
fn init_creates_config() {
    let dir = TempDir::new().unwrap();

    backstop()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created backstop.toml"));

    assert!(dir.path().join("backstop.toml").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    // First init
    backstop()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    // Second init should skip
    backstop()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn list_models_from_config() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("backstop.toml");
    std::fs::write(
        &config,
        "[providers.anthropic]\ntype = \"anthropic\"\napi_key = \"sk-test\"\n",
    )
    .unwrap();

    backstop()
        .env_remove("BACKSTOP_OPENAI_KEY")
        .arg("list-models")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Provider: anthropic"))
        .stdout(predicate::str::contains("claude-sonnet-4-20250514"));
}

#[test]
fn missing_config_file() {
    backstop()
        .arg("list-models")
        .arg("--config")
        .arg("no_such_config.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
