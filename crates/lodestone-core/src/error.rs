// crates/lodestone-core/src/error.rs
// Standardized error types for Lodestone

use thiserror::Error;

/// Main error type for the Lodestone library
#[derive(Error, Debug)]
pub enum LodestoneError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("agent error: {0}")]
    Agent(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error("task cancelled")]
    Cancelled,

    #[error("unknown error: {0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Convenience type alias for Result using LodestoneError
pub type Result<T> = std::result::Result<T, LodestoneError>;

impl From<String> for LodestoneError {
    fn from(s: String) -> Self {
        LodestoneError::Other(s)
    }
}

impl From<tokio::task::JoinError> for LodestoneError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            LodestoneError::Cancelled
        } else {
            LodestoneError::Other(err.to_string())
        }
    }
}

impl From<LodestoneError> for String {
    fn from(err: LodestoneError) -> Self {
        err.to_string()
    }
}
