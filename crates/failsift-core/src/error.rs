//! Error types for failsift

use thiserror::Error;

/// Result type alias using failsift's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for failsift operations
#[derive(Error, Debug)]
pub enum Error {
    /// Redis error
    #[error("Redis error: {0}")]
    Redis(String),

    /// Unknown rule referenced at call time
    #[error("unknown rule: {name}")]
    UnknownRule {
        /// The rule name that was not found in the registry
        name: String,
    },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an unknown rule error
    pub fn unknown_rule(name: impl Into<String>) -> Self {
        Self::UnknownRule { name: name.into() }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
