//! Notification transport errors.

use thiserror::Error;

/// Errors that can occur when handing a message to the push service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("push request failed: {0}")]
    Request(String),

    /// The push service answered with a non-success status.
    #[error("push service returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },
}
