//! Error types for Darkroom.

use thiserror::Error;

/// Main error type for Darkroom operations.
#[derive(Error, Debug)]
pub enum DarkroomError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Resource limit: {0}")]
    ResourceLimit(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Session already disposed")]
    Disposed,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Result type alias for Darkroom operations.
pub type Result<T> = std::result::Result<T, DarkroomError>;
