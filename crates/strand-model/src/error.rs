use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("unknown http method: {0}")]
    UnknownMethod(String),

    #[error("unknown handling directive: {0}")]
    UnknownDirective(String),

    #[error("unknown jitter strategy: {0}")]
    UnknownJitter(String),

    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to encode parameters: {0}")]
    Encoding(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
