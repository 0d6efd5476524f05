//! Error types for the synchronization engine.
//!
//! # Design
//! One enum per layer. `ApiError` is everything the remote can do wrong and
//! keeps `NotFound` separate because the deletion pass may treat it as
//! success. `StoreError` is a local persistence failure. `SyncError` is what
//! engine operations return; remote failures only reach it from the local
//! operations, because the passes convert them into a rollback.

use thiserror::Error;

use crate::state::TransitionError;
use crate::types::TodoId;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures talking to the remote service of record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was received (connection refused, timeout, reset).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The server returned 404: the requested todo does not exist.
    #[error("resource not found")]
    NotFound,

    /// The server rejected the request with a 4xx other than 404.
    #[error("client error HTTP {status}: {body}")]
    Client { status: u16, body: String },

    /// The server failed with a 5xx.
    #[error("server error HTTP {status}: {body}")]
    Server { status: u16, body: String },

    /// Any other non-success status.
    #[error("unexpected HTTP {status}: {body}")]
    Unexpected { status: u16, body: String },

    /// The response body could not be decoded into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            404 => ApiError::NotFound,
            400..=499 => ApiError::Client { status, body },
            500..=599 => ApiError::Server { status, body },
            _ => ApiError::Unexpected { status, body },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound)
    }
}

/// Failures of the local record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted row could not be decoded (unknown ordinal, bad timestamp).
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("todo not found: {0}")]
    NotFound(TodoId),
}
