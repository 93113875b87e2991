//! Stream Errors
//!
//! Failures surfaced by the filter-changing calls on
//! [`StreamClient`](crate::StreamClient). Failures inside a running read loop
//! are never returned to the consumer; they are logged and retried.

use thiserror::Error;

/// Errors returned by connect operations
#[derive(Debug, Error)]
pub enum StreamError {
    /// Username or password is empty
    #[error("The username or password is invalid")]
    InvalidCredentials,

    /// Connect, write or read failure at the socket/HTTP layer
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint answered the handshake with a non-2xx status
    #[error("Endpoint returned HTTP {status}")]
    Endpoint {
        /// The status line the endpoint returned
        status: reqwest::StatusCode,
    },

    /// Handshake attempted on a connection that is already retiring
    #[error("Stale connection")]
    StaleConnection,
}

impl StreamError {
    /// HTTP status carried by an [`StreamError::Endpoint`] error
    #[must_use]
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Endpoint { status } => Some(*status),
            _ => None,
        }
    }
}
