use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{ModelError, ModelResult};

/// Controls how random jitter is applied to retry delays.
///
/// Jitter spreads retries of many requests that failed together (e.g. a site
/// returning 503 to every scraper at once) so they do not hit the server in lockstep.
///
/// Strategies:
/// - `None`: deterministic delays.
/// - `Full`: uniform in `[0, base]`.
/// - `Equal`: `base/2 + rand(0, base/2)`.
/// - `Decorrelated`: uniform in `[first, previous * 3]`, capped at `max`.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JitterStrategy {
    None,
    #[default]
    Full,
    Equal,
    Decorrelated,
}

impl FromStr for JitterStrategy {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" => Ok(JitterStrategy::Equal),
            "" | "none" => Ok(JitterStrategy::None),
            "full" | "default" => Ok(JitterStrategy::Full),
            "decorrelated" => Ok(JitterStrategy::Decorrelated),
            other => Err(ModelError::UnknownJitter(other.to_string())),
        }
    }
}

impl fmt::Display for JitterStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JitterStrategy::None => "none",
            JitterStrategy::Full => "full",
            JitterStrategy::Equal => "equal",
            JitterStrategy::Decorrelated => "decorrelated",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("EQUAL".parse::<JitterStrategy>().unwrap(), JitterStrategy::Equal);
        assert_eq!("default".parse::<JitterStrategy>().unwrap(), JitterStrategy::Full);
        assert_eq!("".parse::<JitterStrategy>().unwrap(), JitterStrategy::None);
        assert!("random".parse::<JitterStrategy>().is_err());
    }

    #[test]
    fn display_roundtrips_through_from_str() {
        for j in [
            JitterStrategy::None,
            JitterStrategy::Full,
            JitterStrategy::Equal,
            JitterStrategy::Decorrelated,
        ] {
            assert_eq!(j.to_string().parse::<JitterStrategy>().unwrap(), j);
        }
    }
}
