//! Error types for tapfetch
//!
//! These cover infrastructure failures (unreadable files, bad configuration).
//! Expected fetch conditions are reported as values, see [`crate::FetchOutcome`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for tapfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for tapfetch operations
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A submodule config file could not be processed
    #[error("Failed to process {}: {reason}", path.display())]
    GitModules {
        /// Path of the offending file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
