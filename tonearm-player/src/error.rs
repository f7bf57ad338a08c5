//! Error types for tonearm-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation. Seek clamping and invalid transport transitions are handled
//! in place and never surface here.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for tonearm-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown resource identifier at resolution time
    #[error("Resource not found: {0}")]
    ResourceNotFound(Uuid),

    /// Unknown track identifier
    #[error("Track not found: {0}")]
    TrackNotFound(Uuid),

    /// Underlying read error while fetching resource bytes
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Bytes are not valid audio
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Tag extraction errors
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid request (malformed URL, path escape, bad payload)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using tonearm-player Error
pub type Result<T> = std::result::Result<T, Error>;
