//! Error types for worldsave
//!
//! Provides a unified error type for all save and load operations.
//!
//! Dangling references and delta-time overflow are deliberately absent here:
//! the first decodes as `None`, the second saturates.

use thiserror::Error;

/// Result type alias using PersistError
pub type Result<T> = std::result::Result<T, PersistError>;

/// Unified error type for worldsave operations
#[derive(Debug, Error)]
pub enum PersistError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Decode Errors
    // -------------------------------------------------------------------------
    #[error("Unexpected end of stream at position {position}")]
    UnexpectedEof { position: u64 },

    #[error("Malformed stream: {0}")]
    Malformed(String),

    // -------------------------------------------------------------------------
    // Writer Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Writer is closed")]
    Closed,

    #[error("Background flush failed: {0}")]
    WorkerFailed(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PersistError {
    /// Map an I/O error raised while decoding at `position`.
    ///
    /// Running out of input is a malformed stream, anything else stays an I/O
    /// failure of the source.
    pub(crate) fn from_read(err: std::io::Error, position: u64) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            PersistError::UnexpectedEof { position }
        } else {
            PersistError::Io(err)
        }
    }
}
