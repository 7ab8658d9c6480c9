//! Error types for collcache
//!
//! Provides a unified error type for all client-side and codec operations.
//! Server-reported failures and local framing failures are kept apart: the
//! former leave the session usable, the latter do not.

use thiserror::Error;

use crate::protocol::Status;

/// Result type alias using CacheError
pub type Result<T> = std::result::Result<T, CacheError>;

/// Unified error type for collcache operations
#[derive(Debug, Error)]
pub enum CacheError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Framing Errors (transport no longer trustworthy)
    // -------------------------------------------------------------------------
    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Opaque mismatch: expected {expected:#010x}, got {actual:#010x}")]
    OpaqueMismatch { expected: u32, actual: u32 },

    #[error("Session is unusable after an earlier framing failure")]
    SessionBroken,

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("Server error #{code:#04x} ({status}){}", fmt_message(.message))]
    Server {
        status: Status,
        code: u16,
        message: String,
    },

    // -------------------------------------------------------------------------
    // Payload Errors
    // -------------------------------------------------------------------------
    #[error("Malformed payload: {0}")]
    Payload(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

fn fmt_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {}", message)
    }
}

/// Broad categories for failures, independent of the exact status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Key does not exist (or has expired)
    NotFound,
    /// Key-level conflict: already exists, CAS mismatch, not stored
    Conflict,
    /// Operation family does not match the stored item type
    TypeMismatch,
    /// Capacity exceeded: collection overflow, item too large, out of memory
    Capacity,
    /// Argument or attribute rejected
    ValueValidation,
    /// List index or b-tree bkey outside the permitted range
    Range,
    /// Element exists / does not exist inside a collection
    ElementPresence,
    /// Authentication failed or needs another step
    Auth,
    /// Unknown command or local framing failure
    Protocol,
    /// Anything else (I/O, configuration, unrecognised status)
    Other,
}

impl CacheError {
    /// Build a server error from a status and the raw error body
    pub fn server(status: Status, body: &[u8]) -> Self {
        CacheError::Server {
            status,
            code: status.code(),
            message: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// The server-reported status, if this error came from the server
    pub fn status(&self) -> Option<Status> {
        match self {
            CacheError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether this is a local contract violation that invalidates the session
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            CacheError::ConnectionClosed
                | CacheError::Framing(_)
                | CacheError::OpaqueMismatch { .. }
                | CacheError::SessionBroken
        )
    }

    /// Categorize the error
    pub fn category(&self) -> ErrorCategory {
        match self {
            CacheError::Server { status, .. } => status.category(),
            e if e.is_framing() => ErrorCategory::Protocol,
            CacheError::Payload(_) => ErrorCategory::Protocol,
            _ => ErrorCategory::Other,
        }
    }
}
