//! Shared pieces of the external API client boundary.
//!
//! The generated REST clients live outside this crate. Each resource module
//! declares the operations it needs as an async trait; every failure those
//! operations report is an [`ApiError`].

use thiserror::Error;

/// HTTP status the API uses for missing resources.
pub const STATUS_NOT_FOUND: u16 = 404;

/// An opaque failure reported by an API client.
///
/// The only case the provider looks inside is "not found", which drives drift
/// detection on read and completion detection on delete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The API answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error body or reason phrase.
        message: String,
    },

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    /// Create an error for an HTTP status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Create a 404 error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::status(STATUS_NOT_FOUND, message)
    }

    /// Whether this is the distinguished 404 case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == STATUS_NOT_FOUND)
    }
}
