//! Error types for the Stratus provider.

use thiserror::Error;

use crate::client::ApiError;
use crate::diagnostics::Diagnostic;

/// Errors that can occur while mapping, building payloads or reconciling.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A caller contract was violated (missing response, missing model, or a
    /// guaranteed field absent from both the response and prior state).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A framework value could not be decomposed into its nested shape.
    #[error("Conversion error at {path}: {message}")]
    Conversion {
        /// Attribute path of the malformed value.
        path: String,
        /// What was wrong with it.
        message: String,
    },

    /// An external API call failed.
    #[error("Calling API: {0}")]
    Api(#[from] ApiError),

    /// The observed collection could not be listed before reconciling.
    #[error("Fetching existing entries: {0}")]
    Fetch(#[source] ApiError),

    /// A single create or delete failed in the middle of a reconciliation.
    ///
    /// Entries handled before the failure keep their new state.
    #[error("{action} entry {key}: {source}")]
    ReconcileStep {
        /// `"Creating"` or `"Deleting"`.
        action: &'static str,
        /// Natural key of the entry being processed.
        key: String,
        /// The underlying API failure.
        #[source]
        source: ApiError,
    },

    /// An import identifier did not match the expected composite format.
    #[error("Expected import identifier with format: {expected} Got: {got:?}")]
    ImportFormat {
        /// The expected pattern, e.g. `[project_id],[instance_id],[name]`.
        expected: String,
        /// The identifier that was supplied.
        got: String,
    },

    /// A numeric value cannot be represented by the wire type.
    #[error("Value {value} of {field} is out of range for the API")]
    OutOfRange {
        /// Attribute path of the offending value.
        field: String,
        /// The rejected value.
        value: i64,
    },

    /// A wait handler ran out of time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// A wait handler was cancelled by its caller.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// The awaited resource reached a failed terminal state.
    #[error("Wait failed: {0}")]
    WaitFailed(String),

    /// The provider configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProviderError {
    /// Shorthand for [`ProviderError::Conversion`].
    pub fn conversion(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Get the error message as a string.
    ///
    /// Returns the bare message for string variants and a fixed description
    /// for variants wrapping another error.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg) => msg,
            Self::Conversion { message, .. } => message,
            Self::Api(_err) => "API call failed (see Display output)",
            Self::Fetch(_err) => "listing existing entries failed (see Display output)",
            Self::ReconcileStep { .. } => "reconciliation stopped (see Display output)",
            Self::ImportFormat { .. } => "unexpected import identifier format",
            Self::OutOfRange { .. } => "value out of range",
            Self::DeadlineExceeded(msg) => msg,
            Self::Cancelled(msg) => msg,
            Self::WaitFailed(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
        }
    }

    /// The attribute path this error is attributable to, if any.
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Self::Conversion { path, .. } => Some(path),
            Self::OutOfRange { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Whether the error wraps an API "not found" response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(err) if err.is_not_found())
    }
}

impl From<ProviderError> for Diagnostic {
    fn from(err: ProviderError) -> Self {
        let summary = match &err {
            ProviderError::InvalidInput(_) => "Invalid input",
            ProviderError::Conversion { .. } => "Value conversion failed",
            ProviderError::Api(_) | ProviderError::Fetch(_) => "Error calling API",
            ProviderError::ReconcileStep { .. } => "Reconciliation incomplete",
            ProviderError::ImportFormat { .. } => "Unexpected import identifier",
            ProviderError::OutOfRange { .. } => "Value out of range",
            ProviderError::DeadlineExceeded(_)
            | ProviderError::Cancelled(_)
            | ProviderError::WaitFailed(_) => "Waiting for operation",
            ProviderError::Configuration(_) => "Invalid provider configuration",
            ProviderError::Serialization(_) => "Serialization error",
        };
        let diagnostic = Diagnostic::error(summary).with_detail(err.to_string());
        match err.attribute() {
            Some(path) => diagnostic.with_attribute(path),
            None => diagnostic,
        }
    }
}
