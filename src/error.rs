//! Hub error types
//!
//! Errors returned by the hub's public API.

use thiserror::Error;

/// Errors returned by hub operations
#[derive(Error, Debug)]
pub enum HubError {
    /// `init` was called more than once in this process
    #[error("Event hub already initialized")]
    AlreadyInitialized,

    /// An operation needed the process hub before `init` was called
    #[error("Event hub not initialized")]
    NotInitialized,

    /// The publish queue is at capacity
    #[error("Event queue is full")]
    QueueFull,

    /// The broadcast workers are gone
    #[error("Event hub is closed")]
    Closed,

    /// IO error while binding or serving
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server failure
    #[error("Server error: {0}")]
    Server(String),
}

/// Result type for hub operations
pub type HubResult<T> = Result<T, HubError>;
