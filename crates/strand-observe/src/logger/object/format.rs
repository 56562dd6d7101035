use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::logger::error::LoggerError;

/// Where and how log events are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
#[non_exhaustive]
pub enum LoggerFormat {
    /// Line-per-event text, coloured on a terminal.
    #[default]
    Text,
    Json,
    /// Native journald fields. Linux only.
    Journald,
}

/// Accepted spellings, canonical name first.
const NAMES: &[(LoggerFormat, &[&str])] = &[
    (LoggerFormat::Text, &["text", "plain", "pretty"]),
    (LoggerFormat::Json, &["json", "structured"]),
    (LoggerFormat::Journald, &["journald", "journal"]),
];

impl LoggerFormat {
    pub fn as_str(self) -> &'static str {
        NAMES
            .iter()
            .find(|(format, _)| *format == self)
            .map_or("text", |(_, names)| names[0])
    }
}

impl FromStr for LoggerFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let format = NAMES
            .iter()
            .find(|(_, names)| names.contains(&wanted.as_str()))
            .map(|(format, _)| *format)
            .ok_or_else(|| LoggerError::InvalidFormat(s.to_string()))?;

        if format == LoggerFormat::Journald && !cfg!(target_os = "linux") {
            return Err(LoggerError::JournaldNotSupported);
        }
        Ok(format)
    }
}

impl TryFrom<String> for LoggerFormat {
    type Error = LoggerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<LoggerFormat> for &'static str {
    fn from(format: LoggerFormat) -> Self {
        format.as_str()
    }
}

impl fmt::Display for LoggerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
