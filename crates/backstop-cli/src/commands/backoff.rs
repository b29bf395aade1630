//! The `backstop backoff` command.

use std::time::Duration;

use anyhow::Result;
use comfy_table::{Cell, Table};

use backstop_core::backoff::{backoff_schedule, calculate_backoff, jitter_window};
use backstop_core::retry::RetryConfig;
use backstop_core::retry_after::parse_retry_after;

pub fn execute(
    attempts: u32,
    base_ms: u64,
    max_ms: u64,
    retry_after: Option<String>,
    seed_free: bool,
) -> Result<()> {
    anyhow::ensure!(base_ms > 0, "base delay must be positive");
    anyhow::ensure!(
        base_ms <= max_ms,
        "base delay ({base_ms}ms) exceeds max delay ({max_ms}ms)"
    );

    let config = RetryConfig {
        max_retries: attempts,
        base_delay: Duration::from_millis(base_ms),
        max_delay: Duration::from_millis(max_ms),
        ..RetryConfig::default()
    };

    let hint = match &retry_after {
        Some(value) => Some(
            parse_retry_after(value)
                .ok_or_else(|| anyhow::anyhow!("invalid Retry-After value: '{value}'"))?,
        ),
        None => None,
    };

    let mut table = Table::new();
    match hint {
        Some(hint) => {
            table.set_header(vec!["Retry", "Delay (server hint)"]);
            for attempt in 0..attempts {
                let delay = calculate_backoff(attempt, config.base_delay, config.max_delay, Some(hint));
                table.add_row(vec![
                    Cell::new(attempt + 1),
                    Cell::new(format!("{}ms", delay.as_millis())),
                ]);
            }
        }
        None => {
            let mut header = vec!["Retry", "Nominal", "Jitter window"];
            if seed_free {
                header.push("Sample");
            }
            table.set_header(header);
            for (attempt, nominal) in (0..attempts).zip(backoff_schedule(&config, attempts)) {
                let (low, high) = jitter_window(attempt, config.base_delay, config.max_delay);
                let mut row = vec![
                    Cell::new(attempt + 1),
                    Cell::new(format!("{}ms", nominal.as_millis())),
                    Cell::new(format!("{}-{}ms", low.as_millis(), high.as_millis())),
                ];
                if seed_free {
                    let sample = calculate_backoff(attempt, config.base_delay, config.max_delay, None);
                    row.push(Cell::new(format!("{}ms", sample.as_millis())));
                }
                table.add_row(row);
            }
        }
    }

    println!("{table}");
    Ok(())
}
