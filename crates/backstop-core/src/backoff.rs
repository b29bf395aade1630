//! Exponential backoff with symmetric jitter.
//!
//! Delays grow as `base × 2^attempt`, are spread by ±25% uniform jitter and
//! are clamped to a ceiling. A server-supplied wait hint (Retry-After) takes
//! precedence over the local estimate.

use std::time::Duration;

use crate::retry::RetryConfig;

/// Fraction of the nominal delay that jitter may add or remove.
pub const JITTER_FRACTION: f64 = 0.25;

// 2^1023 is the largest power of two representable as a finite f64.
const MAX_EXPONENT: u32 = 1023;

/// Compute the delay before retry number `attempt` (0-based).
///
/// If `retry_after` is present it wins, capped at `max_delay`. Otherwise the
/// nominal exponential delay is jittered by a sample from the thread RNG.
pub fn calculate_backoff(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    calculate_backoff_with_jitter(
        attempt,
        base_delay,
        max_delay,
        retry_after,
        rand::random::<f64>(),
    )
}

/// Same as [`calculate_backoff`], with the jitter sample supplied by the caller.
///
/// `unit` is a value in `[0, 1)`: `0.0` yields the low edge of the jitter
/// window (-25%), `0.5` the nominal delay, values close to `1.0` the high edge.
/// Out-of-range samples are clamped.
pub fn calculate_backoff_with_jitter(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    retry_after: Option<Duration>,
    unit: f64,
) -> Duration {
    if let Some(hint) = retry_after {
        return hint.min(max_delay);
    }

    let unit = if unit.is_finite() {
        unit.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let factor = 1.0 + (unit * 2.0 - 1.0) * JITTER_FRACTION;
    let exponent = attempt.min(MAX_EXPONENT) as i32;
    let secs = base_delay.as_secs_f64() * 2f64.powi(exponent) * factor;
    let max_secs = max_delay.as_secs_f64();

    if !secs.is_finite() || secs >= max_secs {
        max_delay
    } else {
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// The un-jittered delay for `attempt`, clamped to `max_delay`.
pub fn nominal_delay(attempt: u32, base_delay: Duration, max_delay: Duration) -> Duration {
    2u32.checked_pow(attempt)
        .and_then(|factor| base_delay.checked_mul(factor))
        .map_or(max_delay, |delay| delay.min(max_delay))
}

/// The range `[low, high]` that a jittered delay for `attempt` can fall in.
pub fn jitter_window(attempt: u32, base_delay: Duration, max_delay: Duration) -> (Duration, Duration) {
    let low = calculate_backoff_with_jitter(attempt, base_delay, max_delay, None, 0.0);
    let high = calculate_backoff_with_jitter(attempt, base_delay, max_delay, None, 1.0);
    (low, high)
}

/// Nominal delays for the first `attempts` retries of `config`.
pub fn backoff_schedule(config: &RetryConfig, attempts: u32) -> Vec<Duration> {
    (0..attempts)
        .map(|attempt| nominal_delay(attempt, config.base_delay, config.max_delay))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(1000);
    const MAX: Duration = Duration::from_secs(60);

    #[test]
    fn jittered_delay_stays_in_window() {
        for attempt in 0..8 {
            let nominal = BASE.as_secs_f64() * 2f64.powi(attempt as i32);
            let low = (nominal * 0.75).min(MAX.as_secs_f64());
            let high = (nominal * 1.25).min(MAX.as_secs_f64());
            for _ in 0..50 {
                let delay = calculate_backoff(attempt, BASE, MAX, None).as_secs_f64();
                assert!(
                    delay >= low - 1e-9 && delay <= high + 1e-9,
                    "attempt {attempt}: {delay} not in [{low}, {high}]"
                );
            }
        }
    }

    #[test]
    fn pinned_jitter_hits_window_edges() {
        let low = calculate_backoff_with_jitter(2, BASE, MAX, None, 0.0);
        let mid = calculate_backoff_with_jitter(2, BASE, MAX, None, 0.5);
        let high = calculate_backoff_with_jitter(2, BASE, MAX, None, 1.0);
        assert_eq!(low, Duration::from_millis(3000));
        assert_eq!(mid, Duration::from_millis(4000));
        assert_eq!(high, Duration::from_millis(5000));
    }

    #[test]
    fn server_hint_overrides_attempt() {
        let hint = Duration::from_secs(7);
        for attempt in [0, 3, 10] {
            assert_eq!(calculate_backoff(attempt, BASE, MAX, Some(hint)), hint);
        }
    }

    #[test]
    fn server_hint_is_capped_at_max() {
        let hint = Duration::from_secs(600);
        assert_eq!(calculate_backoff(0, BASE, MAX, Some(hint)), MAX);
    }

    #[test]
    fn large_attempts_saturate_at_max() {
        assert_eq!(calculate_backoff(40, BASE, MAX, None), MAX);
        assert_eq!(calculate_backoff(u32::MAX, BASE, MAX, None), MAX);
        assert_eq!(nominal_delay(64, BASE, MAX), MAX);
    }

    #[test]
    fn nan_sample_falls_back_to_nominal() {
        let delay = calculate_backoff_with_jitter(1, BASE, MAX, None, f64::NAN);
        assert_eq!(delay, Duration::from_millis(2000));
    }

    #[test]
    fn schedule_doubles_until_ceiling() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(4),
            ..RetryConfig::default()
        };
        let schedule: Vec<u128> = backoff_schedule(&config, 5)
            .into_iter()
            .map(|d| d.as_millis())
            .collect();
        assert_eq!(schedule, vec![500, 1000, 2000, 4000, 4000]);
    }

    #[test]
    fn window_is_clamped() {
        let (low, high) = jitter_window(6, BASE, MAX);
        assert_eq!(low, Duration::from_secs(48));
        assert_eq!(high, MAX);
    }
}
