//! The lifecycle contract every managed resource implements.
//!
//! The host decodes plan and state blocks into a resource's model type and
//! calls one of these operations per resource instance. Implementations build
//! payloads, call the API client, wait for the service to settle, and map the
//! canonical response back onto the model.

use async_trait::async_trait;

use crate::client::ApiError;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

/// Result of refreshing a resource's state.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome<M> {
    /// The resource exists; here is its refreshed state.
    Refreshed(M),
    /// The resource no longer exists and should be dropped from state.
    Removed,
}

impl<M> ReadOutcome<M> {
    /// The refreshed model, if the resource still exists.
    pub fn into_model(self) -> Option<M> {
        match self {
            Self::Refreshed(model) => Some(model),
            Self::Removed => None,
        }
    }

    /// Whether the resource was found to be gone.
    pub fn is_removed(&self) -> bool {
        matches!(self, Self::Removed)
    }
}

/// Trait that resource implementations must implement.
///
/// # Example
///
/// ```ignore
/// use stratus_provider::provider::{ManagedResource, ReadOutcome};
///
/// struct Bucket;
///
/// #[async_trait::async_trait]
/// impl ManagedResource for Bucket {
///     type Model = BucketModel;
///
///     fn type_name(&self) -> &'static str {
///         "stratus_bucket"
///     }
///
///     async fn create(&self, planned: BucketModel) -> Result<BucketModel, ProviderError> {
///         // build payload, call API, map response
///     }
///
///     // ... implement the other operations
/// }
/// ```
#[async_trait]
pub trait ManagedResource: Send + Sync {
    /// The typed configuration model.
    type Model: Clone + Send + Sync;

    /// The resource type name as users write it, e.g. `stratus_observability_scrapeconfig`.
    fn type_name(&self) -> &'static str;

    /// Run attribute validators over a configuration.
    ///
    /// The host calls this before any other operation. The default accepts
    /// everything.
    fn validate(&self, _model: &Self::Model) -> Vec<Diagnostic> {
        Vec::new()
    }

    /// Create the resource and return its canonical state.
    async fn create(&self, planned: Self::Model) -> Result<Self::Model, ProviderError>;

    /// Refresh the resource's state.
    async fn read(&self, state: Self::Model) -> Result<ReadOutcome<Self::Model>, ProviderError>;

    /// Apply `planned` to a resource currently at `prior`.
    async fn update(
        &self,
        prior: Self::Model,
        planned: Self::Model,
    ) -> Result<Self::Model, ProviderError>;

    /// Delete the resource.
    async fn delete(&self, state: Self::Model) -> Result<(), ProviderError>;

    /// Turn an import identifier into a model holding just the identifying
    /// attributes; the host follows up with [`read`](Self::read).
    async fn import_state(&self, id: &str) -> Result<Self::Model, ProviderError>;
}

/// Treat a 404 from a lookup as "gone" instead of an error.
pub fn found<T>(result: Result<T, ApiError>) -> Result<Option<T>, ProviderError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(ProviderError::Api(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_maps_not_found_to_none() {
        assert_eq!(found(Ok::<_, ApiError>(1)).unwrap(), Some(1));
        assert_eq!(found::<i32>(Err(ApiError::not_found("gone"))).unwrap(), None);

        let err = found::<i32>(Err(ApiError::status(500, "boom"))).unwrap_err();
        assert!(matches!(err, ProviderError::Api(_)));
    }

    #[test]
    fn test_read_outcome() {
        let outcome = ReadOutcome::Refreshed(3);
        assert!(!outcome.is_removed());
        assert_eq!(outcome.into_model(), Some(3));

        let outcome: ReadOutcome<i32> = ReadOutcome::Removed;
        assert!(outcome.is_removed());
        assert_eq!(outcome.into_model(), None);
    }
}
