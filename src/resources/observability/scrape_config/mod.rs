//! Observability scrape jobs.
//!
//! A scrape job tells an observability instance which endpoints to scrape and
//! how: static targets or HTTP service discovery, optional basic auth, OAuth2
//! or TLS settings, and relabeling rules for the scraped samples.
//!
//! - [`map_fields`] maps an API response onto the model.
//! - [`to_create_payload`] / [`to_update_payload`] build request bodies.
//! - [`set_defaults_create`] / [`set_defaults_update`] fill service defaults.
//! - [`ScrapeConfigResource`] runs the lifecycle against a [`ScrapeConfigApi`].

use crate::identifier::IdFormat;

pub mod mapper;
pub mod model;
pub mod params;
pub mod payload;
pub mod resource;
#[allow(missing_docs)]
pub mod wire;

pub use mapper::map_fields;
pub use model::{ScrapeConfigModel, ScrapeConfigParts};
pub use params::{decode_saml2, encode_saml2};
pub use payload::{set_defaults_create, set_defaults_update, to_create_payload, to_update_payload};
pub use resource::{ScrapeConfigApi, ScrapeConfigResource, SCRAPE_CONFIG_TYPE};

/// Identifier format `[project_id],[instance_id],[name]`.
pub const SCRAPE_CONFIG_ID: IdFormat = IdFormat::new(&["project_id", "instance_id", "name"]);
