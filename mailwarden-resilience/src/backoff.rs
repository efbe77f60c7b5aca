//! Pure backoff-interval calculation: exponential with jitter, capped at a
//! configured maximum.
//!
//! `max_interval` is a hard ceiling applied *after* jitter, not only before
//! it, so a jittered value can never exceed the configured maximum.

use std::time::Duration;

use rand::Rng;

/// Jitter is a fixed ±20% of the (possibly exponential) raw interval and is
/// not configurable.
const JITTER_FACTOR: f64 = 0.2;

/// Computes the next sleep interval given a consecutive-failure count.
///
/// At `consecutive_failures == 0` the result is `base_interval_secs` jittered,
/// with no exponential term. Otherwise the exponent is
/// `min(consecutive_failures, max_failures)`, so a pathologically long streak
/// never grows the interval past what `max_failures` permits. The final value
/// is always clamped into `[1ms, max_interval_secs]`.
#[must_use]
pub fn next_interval(
    consecutive_failures: u32,
    base_interval_secs: u64,
    multiplier: f64,
    max_interval_secs: u64,
    max_failures: u32,
) -> Duration {
    let raw_secs = if consecutive_failures == 0 {
        base_interval_secs as f64
    } else {
        let exponent = consecutive_failures.min(max_failures);
        (base_interval_secs as f64) * multiplier.powi(exponent as i32)
    };

    jittered_and_clamped(raw_secs, max_interval_secs)
}

fn jittered_and_clamped(raw_secs: f64, max_interval_secs: u64) -> Duration {
    let jitter_range = raw_secs * JITTER_FACTOR;
    let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
    let jittered_secs = (raw_secs + jitter).max(0.0);
    let clamped_secs = jittered_secs.min(max_interval_secs as f64);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let millis = (clamped_secs * 1000.0).max(1.0) as u64;
    Duration::from_millis(millis)
}
