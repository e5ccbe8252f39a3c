//! Error types for ObjDir
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for ObjDir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for ObjDir
#[derive(Debug, Error)]
pub enum Error {
    // Caller errors
    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    // Backing store errors
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Encoding errors
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    // Internal errors
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a malformed path error
    pub fn malformed_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a store unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this is a retryable error
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::Io(_))
    }

    /// Check if the caller violated a precondition
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::MalformedPath { .. } | Self::Configuration(_))
    }
}
