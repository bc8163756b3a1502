//! Error types for VLMO

use thiserror::Error;

/// Result type alias for VLMO operations
pub type Result<T> = std::result::Result<T, VlmoError>;

/// Main error type for VLMO
#[derive(Error, Debug)]
pub enum VlmoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Invalid version label: {0}")]
    InvalidVersion(String),

    #[error("Invalid dataset kind: {0}")]
    InvalidKind(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
