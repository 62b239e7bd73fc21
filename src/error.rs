//! # Error Types
//!
//! Custom error types for the greenhouse controller using `thiserror`.
//!
//! Apart from [`GreenhouseError::ClockUnavailable`] at startup, none of these
//! stop the controller: callers log them and skip or defer the operation.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the greenhouse controller
#[derive(Debug, Error)]
pub enum GreenhouseError {
    /// Time source could not be read
    #[error("Clock unavailable: {0}")]
    ClockUnavailable(String),

    /// A sensor returned an invalid value
    #[error("Sensor read error: {0}")]
    SensorRead(String),

    /// The durable log (or its scratch copy) could not be opened or written
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A log line does not match the record layout
    #[error("Parse error: {0}")]
    Parse(String),

    /// Link unavailable or the remote store could not be reached
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GreenhouseError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for the greenhouse controller
pub type Result<T> = std::result::Result<T, GreenhouseError>;
