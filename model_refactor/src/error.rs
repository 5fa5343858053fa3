//! Error types for model_refactor

use std::path::PathBuf;
use thiserror::Error;

/// Result type for model_refactor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for model_refactor
#[derive(Error, Debug)]
pub enum Error {
    #[error("Model not found: {0}")]
    ModelNotFoundError(String),

    #[error("No snapshot found for model {class_name} at {}", path.display())]
    SnapshotNotFoundError { class_name: String, path: PathBuf },

    #[error("Cannot access {}: {message}", path.display())]
    FileAccessError { path: PathBuf, message: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Model registration error: {0}")]
    ModelRegistrationError(String),

    #[error("Type mapping error: {0}")]
    TypeMappingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Syntax error: {0}")]
    SyntaxError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Build a per-file access error
    pub fn file_access(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Error::FileAccessError {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Convert Serde JSON errors to model_refactor errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to model_refactor errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(error: serde_yaml::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}
