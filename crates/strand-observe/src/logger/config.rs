use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::logger::error::LoggerResult;
use crate::logger::object::{LoggerFormat, LoggerLevel};

/// Environment variable holding the filter expression.
pub const ENV_LEVEL: &str = "STRAND_LOG";
/// Environment variable selecting the output format.
pub const ENV_FORMAT: &str = "STRAND_LOG_FORMAT";

/// Logger configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// Filter expression, e.g. `"info"` or `"strand_core=debug,info"`.
    pub level: LoggerLevel,
    pub with_targets: bool,
    pub use_color: bool,
    /// Emit an event when an instrumented span closes, with its timing.
    pub span_events: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::default(),
            level: LoggerLevel::default(),
            with_targets: true,
            use_color: true,
            span_events: false,
        }
    }
}

impl LoggerConfig {
    /// Defaults overridden by `STRAND_LOG` and `STRAND_LOG_FORMAT` when set.
    pub fn from_env() -> LoggerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> LoggerResult<Self> {
        let mut cfg = Self::default();
        if let Some(level) = lookup(ENV_LEVEL) {
            cfg.level = level.parse()?;
        }
        if let Some(format) = lookup(ENV_FORMAT) {
            cfg.format = format.parse()?;
        }
        Ok(cfg)
    }

    /// Colour only when enabled and stdout is a terminal.
    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}
