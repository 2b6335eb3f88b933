//! Stratus Provider
//!
//! Field mapping, payload construction and child-collection reconciliation for
//! the resources of a Terraform-style provider over the Stratus cloud APIs.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **Four-state values**: [`Value`] distinguishes absent, null, unknown and known
//! - **Mappers**: Populate a resource model from an API response
//! - **Payload builders**: Turn a model into create/update request bodies, filling service defaults
//! - **Reconciliation**: Converge create/delete-only child collections such as ACLs
//! - **Wait handlers**: Poll asynchronous operations with a deadline and cancellation
//! - **Composite identifiers**: Build and parse `a,b,c` style resource IDs
//! - **Error types**: [`ProviderError`] and attribute-scoped [`Diagnostic`]s
//! - **Logging**: Integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_provider::{
//!     ManagedResource, ProviderConfig, Value,
//!     resources::observability::scrape_config::{ScrapeConfigModel, ScrapeConfigResource},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! async fn apply(api: Arc<MyObservabilityClient>) -> Result<(), stratus_provider::ProviderError> {
//!     stratus_provider::init_logging();
//!
//!     let config = ProviderConfig::from_value(serde_json::json!({"wait_timeout_secs": 600}))?;
//!     let resource = ScrapeConfigResource::from_config(
//!         api,
//!         &config,
//!         config.wait_handler(CancellationToken::new()),
//!     );
//!
//!     let state = resource
//!         .create(ScrapeConfigModel {
//!             project_id: Value::Known(project_id()),
//!             instance_id: Value::Known(instance_id()),
//!             name: Value::Known("node-exporter".to_string()),
//!             metrics_path: Value::Known("/metrics".to_string()),
//!             ..Default::default()
//!         })
//!         .await?;
//!     println!("created {:?}", state.id);
//!     Ok(())
//! }
//! ```
//!
//! # Resources
//!
//! - `stratus_observability_scrapeconfig`: scrape jobs of an observability instance
//! - `stratus_secretsmanager_instance`: secrets manager instances and their ACLs
//! - CDN custom domains: certificate mapping and payloads

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod convert;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod provider;
pub mod reconcile;
pub mod resources;
pub mod testing;
pub mod validation;
pub mod value;
pub mod wait;

// Re-export main types at crate root
pub use client::ApiError;
pub use config::ProviderConfig;
pub use diagnostics::{has_errors, Diagnostic, DiagnosticSeverity};
pub use error::ProviderError;
pub use identifier::{CompositeId, IdFormat};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{ManagedResource, ReadOutcome};
pub use reconcile::{sync, SetCollection, SyncReport};
pub use value::{Dynamic, ObjectValue, Value};
pub use wait::{PollStatus, WaitHandler};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
