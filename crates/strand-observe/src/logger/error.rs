use thiserror::Error;

/// Failures while building or installing the log subscriber.
#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}; use text, json or journald")]
    InvalidFormat(String),

    #[error("journald output requires Linux")]
    JournaldNotSupported,

    #[error("journald layer: {0}")]
    JournaldInitFailed(String),

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,

    #[error("bad log filter {0}")]
    InvalidLevel(String),
}

pub type LoggerResult<T> = Result<T, LoggerError>;
