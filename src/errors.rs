//! Error types for AIMY
//!
//! Every failure of the generation client is one of these variants.
//! Transport, decode, and server-reported failures stay distinguishable
//! so the session can decide what to do with them.

use thiserror::Error;

/// Main error type for the generation client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport failure (DNS, connection refused, malformed response)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a client or server error status
    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    /// A response line could not be decoded as a stream record
    #[error("decode: {0}")]
    Decode(String),

    /// A single response line reached the decoder capacity
    #[error("decode: line exceeds maximum buffer size of {limit} bytes")]
    BufferExceeded { limit: usize },

    /// The server reported an error in the `error` field of a record
    #[error("{0}")]
    Server(String),

    /// Request serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Request envelope rejected before sending
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O errors while writing fragments
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the failure was reported by the server rather than
    /// detected locally
    pub fn is_server_side(&self) -> bool {
        matches!(self, ClientError::Server(_) | ClientError::HttpStatus { .. })
    }

    /// True for failures of the stream decoder itself
    pub fn is_decode(&self) -> bool {
        matches!(self, ClientError::Decode(_) | ClientError::BufferExceeded { .. })
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
