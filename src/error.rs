//! Error types for Sjoelguard.

use thiserror::Error;

/// Main error type for Sjoelguard operations.
///
/// A denied admission check is not an error; it is reported as `false`
/// by the limiter.
#[derive(Error, Debug)]
pub enum SjoelguardError {
    /// No policy is registered for the category/action pair
    #[error("Unknown rate limit policy: {category}:{action}")]
    UnknownPolicy { category: String, action: String },

    /// A policy with a zero window or zero limit
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SjoelguardError {
    pub(crate) fn unknown_policy(category: impl Into<String>, action: impl Into<String>) -> Self {
        SjoelguardError::UnknownPolicy {
            category: category.into(),
            action: action.into(),
        }
    }
}

impl From<config::ConfigError> for SjoelguardError {
    fn from(err: config::ConfigError) -> Self {
        SjoelguardError::Config(err.to_string())
    }
}

/// Result type alias for Sjoelguard operations.
pub type Result<T> = std::result::Result<T, SjoelguardError>;
