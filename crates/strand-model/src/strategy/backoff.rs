use serde::{Deserialize, Serialize};

use super::JitterStrategy;

/// Exponential backoff parameters in milliseconds.
///
/// The n-th retry (1-based) waits `first_ms * factor^(n-1)`, capped at `max_ms`,
/// before jitter is applied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffStrategy {
    pub jitter: JitterStrategy,
    pub first_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self {
            jitter: JitterStrategy::Full,
            first_ms: 500,
            max_ms: 8_000,
            factor: 2.0,
        }
    }
}
