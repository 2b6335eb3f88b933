//! Secrets manager resources.

pub mod instance;
#[allow(missing_docs)]
pub mod wire;

pub use instance::{
    map_fields, InstanceAcls, InstanceModel, SecretsManagerApi, SecretsManagerInstanceResource,
    INSTANCE_TYPE,
};
