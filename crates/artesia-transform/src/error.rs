//! Error type for transformation calls.

use std::time::Duration;

/// Reasons a transformation did not produce a usable result.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// HTTP request failed (connect, TLS, read timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error status.
    #[error("transformation API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the service.
        message: String,
    },

    /// The response could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response parsed but carried no result.
    #[error("transformation returned no content")]
    EmptyResult,

    /// The service explicitly declined the request.
    #[error("transformation rejected: {0}")]
    Rejected(String),

    /// The call did not finish in time.
    #[error("transformation timed out after {0:?}")]
    Timeout(Duration),

    /// The implementation panicked.
    #[error("transformation panicked: {0}")]
    Panicked(String),
}
