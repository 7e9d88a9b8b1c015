use thiserror::Error;

/// Core-level errors
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invariant violation: {0}")]
    InvariantViolation(&'static str),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
