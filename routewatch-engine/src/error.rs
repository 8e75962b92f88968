//! Error types for the engine.

use thiserror::Error;

/// Errors that can occur inside the engine.
///
/// None of these escape as panics: fetch failures are recorded per domain,
/// connection failures become a connection state, and stale results are
/// only logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Request or channel failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Payload could not be decoded.
    #[error("Failed to parse payload: {0}")]
    Parse(String),

    /// Request exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// A response arrived for a generation that has been superseded.
    #[error("Discarded result of generation {generation} (latest is {latest})")]
    StaleResultDiscarded { generation: u64, latest: u64 },

    /// The push channel dropped.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Configuration is missing or invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A background task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Timeout
        } else if err.is_decode() {
            EngineError::Parse(err.to_string())
        } else {
            EngineError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for EngineError {
    fn from(err: tokio::task::JoinError) -> Self {
        EngineError::Task(err.to_string())
    }
}
