//! The `backstop classify` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use backstop_core::classify::{classify, AiError};
use backstop_core::retry_after::parse_retry_after_ms;
use backstop_core::Failure;

pub fn execute(
    message: String,
    status: Option<u16>,
    retry_after: Option<String>,
    format: String,
) -> Result<()> {
    let mut failure = match status {
        Some(status) => Failure::with_status(status, message),
        None => Failure::new(message),
    };
    if let Some(value) = &retry_after {
        match parse_retry_after_ms(value) {
            Some(ms) => failure = failure.retry_after_ms(ms),
            None => eprintln!("Warning: ignoring unparseable Retry-After value '{value}'"),
        }
    }

    let classified = classify(&failure);

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&classified)?),
        "text" => print_text(&classified),
        other => anyhow::bail!("unknown format '{other}' (expected text or json)"),
    }

    Ok(())
}

pub(crate) fn print_text(classified: &AiError) {
    println!("Category:  {}", classified.category);
    println!(
        "Retryable: {}",
        if classified.retryable { "yes" } else { "no" }
    );
    if let Some(ms) = classified.suggested_wait_ms {
        println!("Wait:      {ms}ms");
    }
    println!("Message:   {}", classified.user_message);

    let mut table = Table::new();
    table.set_header(vec!["#", "Action", "Id", "Description"]);
    for (rank, action) in classified.recovery_actions.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(action.label()),
            Cell::new(action.id()),
            Cell::new(action.description()),
        ]);
    }
    println!("{table}");
}
