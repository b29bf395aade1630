//! The `backstop retry-after` command.

use anyhow::Result;

use backstop_core::retry_after::parse_retry_after_ms;

pub fn execute(value: String) -> Result<()> {
    match parse_retry_after_ms(&value) {
        Some(ms) => println!("{ms}ms"),
        None => println!("absent"),
    }
    Ok(())
}
