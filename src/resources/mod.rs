//! Resource implementations, one module per service.
//!
//! Each resource module holds its wire types, its configuration model, the
//! mapper and payload builder between them, and the lifecycle that calls the
//! service API.

pub mod cdn;
pub mod observability;
pub mod secretsmanager;
