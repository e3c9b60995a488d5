//! Request Error Types
//!
//! Errors reported back to a client inside an error envelope. None of them
//! terminate the connection.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes carried in the `code` field of an error envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Unexpected internal fault (malformed request, encoding failure)
    ServerError,
    /// The registration validator rejected the request
    Unregistered,
    /// Unknown request type
    NotSupported,
}

impl ErrorCode {
    /// Wire representation of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ServerError => "server_error",
            ErrorCode::Unregistered => "unregistered",
            ErrorCode::NotSupported => "not_supported",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while handling a client request
#[derive(Error, Debug)]
pub enum RequestError {
    /// The frame could not be decoded as a request
    #[error("{0}")]
    Malformed(#[from] serde_json::Error),

    /// Registration arguments were rejected
    #[error("{0}")]
    Unregistered(String),

    /// Request type is not handled by the hub
    #[error("Invalid type: {0}")]
    NotSupported(String),

    /// Any other internal failure
    #[error("{0}")]
    Internal(String),
}

impl RequestError {
    /// Code reported to the client for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            RequestError::Malformed(_) | RequestError::Internal(_) => ErrorCode::ServerError,
            RequestError::Unregistered(_) => ErrorCode::Unregistered,
            RequestError::NotSupported(_) => ErrorCode::NotSupported,
        }
    }
}
