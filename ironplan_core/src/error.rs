//! Error types for the ironplan_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for ironplan_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad input to a constructor or validate call; never retried
    #[error("Validation error: {0}")]
    Validation(String),

    /// A referenced max, lift, session, or program is missing
    #[error("Not found: {0}")]
    NotFound(String),

    /// Attempted state transition not legal from the current state.
    /// Carries the current state so clients can see what blocked them.
    #[error("Invalid transition: cannot {action} (current state: {current}): {detail}")]
    InvalidTransition {
        action: String,
        current: String,
        detail: String,
    },

    /// Caller ordering error, e.g. a load referencing a set not yet logged
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Progression handler failure during event dispatch; logged and
    /// isolated, never propagated to the publisher
    #[error("Handler error: {0}")]
    Handler(String),

    /// Catalog validation error
    #[error("Catalog validation error: {0}")]
    Catalog(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),
}

impl Error {
    /// Construct an InvalidTransition error
    pub fn invalid_transition(
        action: impl Into<String>,
        current: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Error::InvalidTransition {
            action: action.into(),
            current: current.into(),
            detail: detail.into(),
        }
    }
}
