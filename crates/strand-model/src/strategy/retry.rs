use serde::{Deserialize, Serialize};

use super::BackoffStrategy;

/// Bounded retry policy applied when every registered retrier passes.
///
/// `max_attempts` counts retries, not the initial request: with the default of 3
/// a failing request is sent at most 4 times.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryStrategy {
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl RetryStrategy {
    /// Policy that never retries.
    pub fn never() -> Self {
        Self {
            max_attempts: 0,
            backoff: BackoffStrategy::default(),
        }
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JitterStrategy;

    #[test]
    fn defaults_are_bounded() {
        let s = RetryStrategy::default();
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.backoff.first_ms, 500);
        assert_eq!(s.backoff.max_ms, 8_000);
        assert_eq!(s.backoff.jitter, JitterStrategy::Full);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let s: RetryStrategy =
            serde_json::from_str(r#"{"maxAttempts": 5, "backoff": {"jitter": "none"}}"#).unwrap();
        assert_eq!(s.max_attempts, 5);
        assert_eq!(s.backoff.jitter, JitterStrategy::None);
        assert_eq!(s.backoff.factor, 2.0);
    }
}
