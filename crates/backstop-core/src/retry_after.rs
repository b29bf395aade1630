//! Retry-After header parsing.
//!
//! The header carries either a number of seconds (`Retry-After: 30`) or an
//! HTTP date (`Retry-After: Wed, 21 Oct 2026 07:28:00 GMT`). Anything that is
//! neither, or a date that is not in the future, is treated as absent.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Parse a Retry-After value relative to the current time.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    parse_retry_after_at(value, Utc::now())
}

/// Parse a Retry-After value relative to `now`.
pub fn parse_retry_after_at(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let date = DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()?
        .with_timezone(&Utc);

    (date - now)
        .to_std()
        .ok()
        .filter(|wait| !wait.is_zero())
}

/// Millisecond form of [`parse_retry_after`], the unit error records carry.
///
/// Waits too long to fit in a `u64` saturate.
pub fn parse_retry_after_ms(value: &str) -> Option<u64> {
    parse_retry_after(value).map(|wait| u64::try_from(wait.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn seconds_form() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_millis(30_000)));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
    }

    #[test]
    fn http_date_in_future() {
        let wait = parse_retry_after_at("Sat, 14 Mar 2026 12:02:00 GMT", fixed_now());
        assert_eq!(wait, Some(Duration::from_secs(120)));
    }

    #[test]
    fn http_date_relative_to_wall_clock() {
        let target = Utc::now() + chrono::Duration::seconds(90);
        let header = target.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let wait = parse_retry_after(&header).expect("future date should parse");
        let ms = wait.as_millis() as i64;
        assert!((88_000..=90_000).contains(&ms), "got {ms}ms");
    }

    #[test]
    fn rfc3339_fallback() {
        let wait = parse_retry_after_at("2026-03-14T12:00:10Z", fixed_now());
        assert_eq!(wait, Some(Duration::from_secs(10)));
    }

    #[test]
    fn past_or_present_date_is_absent() {
        assert_eq!(
            parse_retry_after_at("Sat, 14 Mar 2026 11:59:00 GMT", fixed_now()),
            None
        );
        assert_eq!(
            parse_retry_after_at("Sat, 14 Mar 2026 12:00:00 GMT", fixed_now()),
            None
        );
    }

    #[test]
    fn garbage_is_absent() {
        assert_eq!(parse_retry_after("garbage"), None);
        assert_eq!(parse_retry_after(""), None);
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(parse_retry_after("1.5"), None);
    }

    #[test]
    fn millisecond_helper() {
        assert_eq!(parse_retry_after_ms("2"), Some(2000));
        assert_eq!(parse_retry_after_ms("soon"), None);
    }

    #[test]
    fn huge_seconds_saturate() {
        assert_eq!(parse_retry_after_ms("18446744073709552"), Some(u64::MAX));
        assert_eq!(
            parse_retry_after_ms(&u64::MAX.to_string()),
            Some(u64::MAX)
        );
    }
}
