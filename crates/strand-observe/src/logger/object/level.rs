use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::logger::error::{LoggerError, LoggerResult};

/// Filter expression in `EnvFilter` syntax, checked when it is built.
///
/// ```
/// use strand_observe::LoggerLevel;
///
/// let level = LoggerLevel::new("warn").unwrap().with_directive("strand_core=debug").unwrap();
/// assert_eq!(level.as_str(), "warn,strand_core=debug");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LoggerLevel(String);

impl LoggerLevel {
    pub fn new(expr: impl Into<String>) -> LoggerResult<Self> {
        let expr = expr.into();
        compile(&expr)?;
        Ok(Self(expr))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Appends one more directive, e.g. a per-crate override.
    pub fn with_directive(&self, directive: &str) -> LoggerResult<Self> {
        if self.0.is_empty() {
            return Self::new(directive);
        }
        Self::new(format!("{},{directive}", self.0))
    }

    pub fn to_env_filter(&self) -> LoggerResult<EnvFilter> {
        compile(&self.0)
    }
}

fn compile(expr: &str) -> LoggerResult<EnvFilter> {
    EnvFilter::try_new(expr).map_err(|e| LoggerError::InvalidLevel(format!("{expr:?}: {e}")))
}

impl Default for LoggerLevel {
    fn default() -> Self {
        Self("info".to_owned())
    }
}

impl FromStr for LoggerLevel {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LoggerLevel {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<LoggerLevel> for String {
    fn from(level: LoggerLevel) -> Self {
        level.0
    }
}
