//! CDN custom domains and their certificates.
//!
//! A custom domain either uses a certificate the CDN manages or one the user
//! uploads. The API never returns the uploaded certificate or key, only its
//! version, so both are carried forward from prior state.

use serde::{Deserialize, Serialize};

use crate::convert::{decode_block, encode_object, int_attr, join_path, string_attr};
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::identifier::IdFormat;
use crate::value::{ObjectValue, Value};

/// Identifier format `[project_id],[distribution_id],[name]`.
pub const CUSTOM_DOMAIN_ID: IdFormat = IdFormat::new(&["project_id", "distribution_id", "name"]);

/// A status error reported for a custom domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusError {
    /// Machine-readable key.
    pub key: Option<String>,
    /// English description.
    pub en: Option<String>,
}

/// The domain part of the API response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    /// Domain name.
    pub name: Option<String>,
    /// Provisioning status, e.g. `ACTIVE`.
    pub status: Option<String>,
    /// Errors blocking activation.
    pub errors: Option<Vec<StatusError>>,
}

/// The certificate part of the API response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CertificateResponse {
    /// Managed by the CDN.
    Managed,
    /// Uploaded by the user; only the version is returned.
    Custom {
        /// Upload counter.
        version: Option<i64>,
    },
}

/// API response for a custom domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomainResponse {
    /// The domain.
    pub custom_domain: Option<CustomDomain>,
    /// Its certificate.
    pub certificate: Option<CertificateResponse>,
}

/// Certificate sent with a create or update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CertificatePayload {
    /// Let the CDN manage the certificate.
    Managed,
    /// Upload a certificate.
    Custom {
        /// PEM certificate chain.
        certificate: String,
        /// PEM private key.
        key: String,
    },
}

/// Request body for creating or replacing a custom domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutCustomDomainPayload {
    /// Certificate to use.
    pub certificate: CertificatePayload,
}

/// Configuration model of a custom domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomDomainModel {
    /// Composite identifier `project_id,distribution_id,name`.
    pub id: Value<String>,
    /// Owning project.
    pub project_id: Value<String>,
    /// CDN distribution.
    pub distribution_id: Value<String>,
    /// Domain name.
    pub name: Value<String>,
    /// Provisioning status.
    pub status: Value<String>,
    /// Errors blocking activation.
    pub errors: Value<Vec<String>>,
    /// `certificate { certificate, private_key, version }`; null means managed.
    pub certificate: Value<ObjectValue>,
}

/// `certificate` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateModel {
    /// PEM certificate chain. Sensitive.
    pub certificate: Value<String>,
    /// PEM private key. Sensitive.
    pub private_key: Value<String>,
    /// Upload counter, computed.
    pub version: Value<i64>,
}

impl CertificateModel {
    /// Decompose the block.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            certificate: string_attr(obj, "certificate", path)?,
            private_key: string_attr(obj, "private_key", path)?,
            version: int_attr(obj, "version", path)?,
        })
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("certificate", self.certificate.clone().into()),
            ("private_key", self.private_key.clone().into()),
            ("version", self.version.clone().into()),
        ])
    }
}

/// Populate `model` from `response`.
pub fn map_fields(
    response: Option<&CustomDomainResponse>,
    model: Option<&mut CustomDomainModel>,
) -> Result<(), ProviderError> {
    let response =
        response.ok_or_else(|| ProviderError::InvalidInput("response input is nil".to_string()))?;
    let model =
        model.ok_or_else(|| ProviderError::InvalidInput("model input is nil".to_string()))?;
    let domain = response
        .custom_domain
        .as_ref()
        .ok_or_else(|| ProviderError::InvalidInput("custom domain not present".to_string()))?;

    let name = match (&domain.name, model.name.as_known()) {
        (Some(name), _) | (None, Some(name)) => name.clone(),
        (None, None) => {
            return Err(ProviderError::InvalidInput(
                "custom domain name not present".to_string(),
            ))
        },
    };
    let project_id = model
        .project_id
        .known_cloned()
        .ok_or_else(|| ProviderError::InvalidInput("project_id not present in model".to_string()))?;
    let distribution_id = model.distribution_id.known_cloned().ok_or_else(|| {
        ProviderError::InvalidInput("distribution_id not present in model".to_string())
    })?;
    let id = CUSTOM_DOMAIN_ID.build(&[&project_id, &distribution_id, &name])?;

    let prior = decode_block(&model.certificate, "certificate", CertificateModel::from_object)?;
    let certificate = match &response.certificate {
        Some(CertificateResponse::Custom { version }) => {
            let prior = prior.into_known().unwrap_or_default();
            Value::Known(
                CertificateModel {
                    certificate: prior.certificate,
                    private_key: prior.private_key,
                    version: Value::from_option(*version),
                }
                .to_object(),
            )
        },
        Some(CertificateResponse::Managed) | None => Value::Null,
    };

    let errors = domain.errors.as_ref().map(|errors| {
        errors
            .iter()
            .filter_map(|e| e.en.clone().or_else(|| e.key.clone()))
            .collect()
    });

    model.id = Value::Known(id.to_string());
    model.name = Value::Known(name);
    model.status = Value::from_option(domain.status.clone());
    model.errors = Value::from_option(errors);
    model.certificate = certificate;
    Ok(())
}

/// Build the certificate part of a payload.
///
/// A null block, or one with neither half set, selects a managed
/// certificate. Setting only one half is an error on the missing attribute.
pub fn build_certificate_payload(
    model: &CustomDomainModel,
) -> Result<CertificatePayload, Diagnostic> {
    let block = decode_block(&model.certificate, "certificate", CertificateModel::from_object)
        .map_err(Diagnostic::from)?;
    let Some(block) = block.into_known() else {
        return Ok(CertificatePayload::Managed);
    };

    match (block.certificate.into_known(), block.private_key.into_known()) {
        (None, None) => Ok(CertificatePayload::Managed),
        (Some(certificate), Some(key)) => Ok(CertificatePayload::Custom { certificate, key }),
        (Some(_), None) => Err(Diagnostic::error("Missing Private Key")
            .with_detail("A custom certificate needs a private key")
            .with_attribute(join_path("certificate", "private_key"))),
        (None, Some(_)) => Err(Diagnostic::error("Missing Certificate")
            .with_detail("A private key needs the matching certificate")
            .with_attribute(join_path("certificate", "certificate"))),
    }
}

/// Build the create or replace payload.
pub fn to_put_payload(model: Option<&CustomDomainModel>) -> Result<PutCustomDomainPayload, Diagnostic> {
    let model = model.ok_or_else(|| {
        Diagnostic::from(ProviderError::InvalidInput("nil model".to_string()))
    })?;
    Ok(PutCustomDomainPayload {
        certificate: build_certificate_payload(model)?,
    })
}
