use thiserror::Error;

use strand_model::ModelError;

/// Error carried by rejected promises and the request pipeline.
///
/// `Clone` because a rejection may be replayed to a late error continuation and
/// fanned out by combinators.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// A transform produced no value, or a completion was called with neither value nor error.
    #[error("unknown error")]
    Unknown,

    #[error("operation cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    /// Network-level failure. Holds the root cause message with client wrappers stripped.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("adapter rejected request: {0}")]
    Adapter(String),

    #[error("request failed after {attempts} retries: {source}")]
    RetryExhausted { attempts: u32, source: Box<Error> },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("response validation failed: {0}")]
    Validation(String),

    #[error("cloudflare challenge detected for {url}")]
    CloudflareChallenge { url: String },

    #[error("too many redirects (limit {limit})")]
    TooManyRedirects { limit: u32 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl Error {
    /// Build a transport error from the innermost cause of `err`.
    pub fn transport(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut cause = err;
        while let Some(next) = cause.source() {
            cause = next;
        }
        Error::Transport(cause.to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether the default retry policy treats this error as transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::Timeout => true,
            Error::HttpStatus { status, .. } => *status >= 500 || *status == 429 || *status == 408,
            _ => false,
        }
    }

    /// HTTP status code, if this is a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        Error::InvalidRequest(e.to_string())
    }
}
