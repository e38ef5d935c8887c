//! Error types and error handling for waypost.
//!
//! This module defines the error taxonomy used throughout the library
//! and the CLI exit codes derived from it.

use thiserror::Error;

/// CLI exit codes.
pub mod exit_code {
    /// Success
    pub const SUCCESS: i32 = 0;
    /// General error
    pub const GENERAL_ERROR: i32 = 1;
    /// Validation or configuration error
    pub const VALIDATION_ERROR: i32 = 2;
    /// Connection/transport error
    pub const CONNECTION_ERROR: i32 = 3;
    /// Timeout error
    pub const TIMEOUT_ERROR: i32 = 4;
    /// Permission (ACL) error
    pub const PERMISSION_ERROR: i32 = 5;
    /// Command line argument error
    pub const CLI_ERROR: i32 = 64;
}

/// The main error type for waypost.
#[derive(Debug, Error)]
pub enum WaypostError {
    /// Requested key or resource is absent. Expected in normal control flow
    /// when probing for existence.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// A conditional write was rejected due to a stale index or lock
    /// contention. The caller decides the retry policy.
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Network or HTTP-layer failure talking to the remote agent.
    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ACL token was rejected by the remote agent. Not locally
    /// recoverable.
    #[error("Permission denied: {message}")]
    Permission { message: String },

    /// Malformed key, value, or argument. Fatal to the specific call.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Operation timed out.
    #[error("Timeout: {operation} (waited {seconds}s)")]
    Timeout { operation: String, seconds: u64 },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WaypostError {
    /// Returns the CLI exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            WaypostError::Validation { .. } => exit_code::VALIDATION_ERROR,
            WaypostError::Transport { .. } => exit_code::CONNECTION_ERROR,
            WaypostError::Timeout { .. } => exit_code::TIMEOUT_ERROR,
            WaypostError::Permission { .. } => exit_code::PERMISSION_ERROR,
            _ => exit_code::GENERAL_ERROR,
        }
    }

    /// Returns true if the error signals an absent key or resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WaypostError::NotFound { .. })
    }

    /// Creates a not-found error for the named resource.
    pub fn not_found(resource: impl Into<String>) -> Self {
        WaypostError::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a conflict error with a message.
    pub fn conflict(message: impl Into<String>) -> Self {
        WaypostError::Conflict {
            message: message.into(),
        }
    }

    /// Creates a transport error with a message.
    pub fn transport(message: impl Into<String>) -> Self {
        WaypostError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error with a message and source.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        WaypostError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a permission error with a message.
    pub fn permission(message: impl Into<String>) -> Self {
        WaypostError::Permission {
            message: message.into(),
        }
    }

    /// Creates a validation error with a message.
    pub fn validation(message: impl Into<String>) -> Self {
        WaypostError::Validation {
            message: message.into(),
        }
    }
}

/// Result type alias for waypost operations.
pub type Result<T> = std::result::Result<T, WaypostError>;
