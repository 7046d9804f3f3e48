// src/error.rs

//! Unified error handling for the schedule watcher.

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// The target site could not be reached within the retry budget
    #[error("source unavailable for {url} after {attempts} attempt(s): {reason}")]
    SourceUnavailable {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// The challenge-solving proxy returned a non-ok status
    #[error("challenge solver failed: {0}")]
    ChallengeSolve(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Subscription storage error
    #[error("Storage error: {0}")]
    Storage(String),
}

impl AppError {
    /// Create a source-unavailable error.
    pub fn source_unavailable(
        url: impl Into<String>,
        attempts: u32,
        reason: impl Into<String>,
    ) -> Self {
        Self::SourceUnavailable {
            url: url.into(),
            attempts,
            reason: reason.into(),
        }
    }

    /// Create a challenge-solver error.
    pub fn challenge(message: impl Into<String>) -> Self {
        Self::ChallengeSolve(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    /// Whether the error only affects the current address/cycle.
    ///
    /// Skippable errors are logged and the address is retried on the next
    /// tick; they must never take the worker down.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::ChallengeSolve(_) | Self::Http(_)
        )
    }
}
