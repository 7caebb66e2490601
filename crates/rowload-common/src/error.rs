//! Error types shared across rowload crates

use thiserror::Error;

/// Result type alias for rowload operations
pub type Result<T> = std::result::Result<T, RowloadError>;

/// Main error type for configuration and setup
#[derive(Error, Debug)]
pub enum RowloadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}. Check the file syntax at the indicated line/column.")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration file not found: '{0}'")]
    ConfigNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RowloadError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
