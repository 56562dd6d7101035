//! Delay computation for retries.
use std::time::Duration;

use rand::Rng;
use strand_model::{BackoffStrategy, JitterStrategy};

/// Un-jittered delay before the `retry`-th retry (1-based), capped at `max_ms`.
pub fn base_delay(strategy: &BackoffStrategy, retry: u32) -> Duration {
    let exponent = retry.saturating_sub(1).min(63) as i32;
    let factor = if strategy.factor.is_finite() && strategy.factor >= 1.0 {
        strategy.factor
    } else {
        1.0
    };
    let raw = strategy.first_ms as f64 * factor.powi(exponent);
    let capped = raw.min(strategy.max_ms as f64).max(0.0);
    Duration::from_millis(capped as u64)
}

/// Delay before the `retry`-th retry with the configured jitter applied.
///
/// `previous` is the delay used for the prior retry; only decorrelated jitter reads it.
pub fn next_delay(strategy: &BackoffStrategy, retry: u32, previous: Option<Duration>) -> Duration {
    let base = base_delay(strategy, retry);
    let mut rng = rand::thread_rng();
    match strategy.jitter {
        JitterStrategy::None => base,
        JitterStrategy::Full => random_between(&mut rng, 0, base.as_millis() as u64),
        JitterStrategy::Equal => {
            let half = base.as_millis() as u64 / 2;
            Duration::from_millis(half) + random_between(&mut rng, 0, half)
        }
        JitterStrategy::Decorrelated => {
            let floor = strategy.first_ms.min(strategy.max_ms);
            let prev = previous.map_or(floor, |d| d.as_millis() as u64);
            let ceiling = prev.saturating_mul(3).min(strategy.max_ms).max(floor);
            random_between(&mut rng, floor, ceiling)
        }
    }
}

fn random_between(rng: &mut impl Rng, low: u64, high: u64) -> Duration {
    if high <= low {
        return Duration::from_millis(low);
    }
    Duration::from_millis(rng.gen_range(low..=high))
}
