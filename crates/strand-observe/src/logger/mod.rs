mod config;
mod error;
mod install;
mod object;

pub use config::LoggerConfig;
pub use error::{LoggerError, LoggerResult};
pub use object::{LoggerFormat, LoggerLevel, LoggerRfc3339};

/// Installs the global tracing subscriber described by `cfg`.
///
/// Can succeed once per process; later calls return [`LoggerError::AlreadyInitialized`].
///
/// # Examples
/// ```rust
/// use strand_observe::{LoggerConfig, init_logger};
///
/// let config = LoggerConfig::default();
/// init_logger(&config).expect("logger");
/// tracing::info!("ready");
/// ```
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    match cfg.format {
        LoggerFormat::Text => install::logger_text(cfg),
        LoggerFormat::Json => install::logger_json(cfg),
        LoggerFormat::Journald => install::logger_journald(cfg),
    }
}
