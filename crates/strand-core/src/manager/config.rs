use std::time::Duration;

use serde::{Deserialize, Serialize};
use strand_model::RetryStrategy;

/// Browser-like default so sites serve the same markup they show users.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";

/// Tunables of a [`super::RequestManager`]. Every field may be omitted in JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    pub user_agent: String,
    pub max_redirects: u32,
    pub retry: RetryStrategy,
    /// Hard cap on retries per request, whatever retriers ask for.
    pub retry_ceiling: u32,
    pub request_timeout_ms: u64,
}

impl ManagerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
            retry: RetryStrategy::default(),
            retry_ceiling: 16,
            request_timeout_ms: 30_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use strand_model::JitterStrategy;

    use super::*;

    #[test]
    fn empty_json_yields_defaults() {
        let cfg: ManagerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ManagerConfig::default());
        assert_eq!(cfg.max_redirects, 10);
        assert_eq!(cfg.retry.max_attempts, 3);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_json_overrides_fields() {
        let cfg: ManagerConfig = serde_json::from_str(
            r#"{"userAgent":"strand/0.1","maxRedirects":2,"retry":{"maxAttempts":1,"backoff":{"jitter":"none"}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.user_agent, "strand/0.1");
        assert_eq!(cfg.max_redirects, 2);
        assert_eq!(cfg.retry.max_attempts, 1);
        assert_eq!(cfg.retry.backoff.jitter, JitterStrategy::None);
        assert_eq!(cfg.retry.backoff.first_ms, 500);
    }
}
