//! CDN resources.

pub mod custom_domain;

pub use custom_domain::{build_certificate_payload, map_fields, CustomDomainModel};
