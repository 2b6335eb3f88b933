//! Configuration model for scrape jobs.
//!
//! Nested blocks sit on the model as [`ObjectValue`]s, the way the host hands
//! them over. The sub-model types below decompose one block each and
//! recompose it again; list-valued children keep their order.

use std::collections::BTreeMap;

use crate::convert::{
    bool_attr, decode_block, decode_block_list, encode_object, int_attr, object_attr,
    string_attr, string_list_attr, string_map_attr,
};
use crate::error::ProviderError;
use crate::value::{ObjectValue, Value};

use super::wire;

/// A scrape job's configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeConfigModel {
    /// Composite identifier `project_id,instance_id,name`.
    pub id: Value<String>,
    /// Owning project.
    pub project_id: Value<String>,
    /// Observability instance.
    pub instance_id: Value<String>,
    /// Job name. Immutable.
    pub name: Value<String>,
    /// HTTP path metrics are fetched from.
    pub metrics_path: Value<String>,
    /// `http` or `https`.
    pub scheme: Value<String>,
    /// Scrape frequency, e.g. `5m`.
    pub scrape_interval: Value<String>,
    /// Per-scrape timeout, e.g. `2m`.
    pub scrape_timeout: Value<String>,
    /// Maximum samples per scrape.
    pub sample_limit: Value<i64>,
    /// `saml2 { enable_url_parameters }`.
    pub saml2: Value<ObjectValue>,
    /// `basic_auth { username, password }`.
    pub basic_auth: Value<ObjectValue>,
    /// `tls_config { insecure_skip_verify }`.
    pub tls_config: Value<ObjectValue>,
    /// `oauth2 { client_id, client_secret, token_url, scopes, tls_config }`.
    pub oauth2: Value<ObjectValue>,
    /// `targets [{ urls, labels }]`.
    pub targets: Value<Vec<ObjectValue>>,
    /// Relabeling rules applied to scraped metrics.
    pub metrics_relabel_configs: Value<Vec<ObjectValue>>,
    /// HTTP service discovery sources.
    pub http_sd_configs: Value<Vec<ObjectValue>>,
    /// Keep labels from scraped data on conflict.
    pub honor_labels: Value<bool>,
    /// Keep timestamps from scraped data.
    pub honor_timestamps: Value<bool>,
}

/// `saml2` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Saml2Model {
    /// Pass SAML2 URL parameters to the target.
    pub enable_url_parameters: Value<bool>,
}

impl Saml2Model {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            enable_url_parameters: bool_attr(obj, "enable_url_parameters", path)?,
        })
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([(
            "enable_url_parameters",
            self.enable_url_parameters.clone().into(),
        )])
    }
}

/// `basic_auth` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicAuthModel {
    /// User name.
    pub username: Value<String>,
    /// Password. Sensitive.
    pub password: Value<String>,
}

impl BasicAuthModel {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            username: string_attr(obj, "username", path)?,
            password: string_attr(obj, "password", path)?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(auth: &wire::BasicAuth) -> Self {
        Self {
            username: Value::Known(auth.username.clone()),
            password: Value::Known(auth.password.clone()),
        }
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("username", self.username.clone().into()),
            ("password", self.password.clone().into()),
        ])
    }

    /// The wire object, only when both credentials are known.
    pub fn to_wire(&self) -> Option<wire::BasicAuth> {
        Some(wire::BasicAuth {
            username: self.username.known_cloned()?,
            password: self.password.known_cloned()?,
        })
    }
}

/// `tls_config` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsConfigModel {
    /// Skip verification of the target certificate.
    pub insecure_skip_verify: Value<bool>,
}

impl TlsConfigModel {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            insecure_skip_verify: bool_attr(obj, "insecure_skip_verify", path)?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(tls: &wire::TlsConfig) -> Self {
        Self {
            insecure_skip_verify: Value::from_option(tls.insecure_skip_verify),
        }
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([(
            "insecure_skip_verify",
            self.insecure_skip_verify.clone().into(),
        )])
    }

    /// The API representation.
    pub fn to_wire(&self) -> wire::TlsConfig {
        wire::TlsConfig {
            insecure_skip_verify: self.insecure_skip_verify.known_cloned(),
        }
    }
}

/// `oauth2` block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OAuth2Model {
    /// OAuth2 client ID.
    pub client_id: Value<String>,
    /// OAuth2 client secret. Sensitive.
    pub client_secret: Value<String>,
    /// Token endpoint.
    pub token_url: Value<String>,
    /// Requested scopes.
    pub scopes: Value<Vec<String>>,
    /// TLS settings for the token endpoint.
    pub tls_config: Value<TlsConfigModel>,
}

impl OAuth2Model {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        let tls_path = crate::convert::join_path(path, "tls_config");
        Ok(Self {
            client_id: string_attr(obj, "client_id", path)?,
            client_secret: string_attr(obj, "client_secret", path)?,
            token_url: string_attr(obj, "token_url", path)?,
            scopes: string_list_attr(obj, "scopes", path)?,
            tls_config: decode_block(
                &object_attr(obj, "tls_config", path)?,
                &tls_path,
                TlsConfigModel::from_object,
            )?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(oauth: &wire::OAuth2) -> Self {
        Self {
            client_id: Value::Known(oauth.client_id.clone()),
            client_secret: Value::Known(oauth.client_secret.clone()),
            token_url: Value::Known(oauth.token_url.clone()),
            scopes: Value::from_option(oauth.scopes.clone()),
            tls_config: Value::from_option(oauth.tls_config.as_ref().map(TlsConfigModel::from_wire)),
        }
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("client_id", self.client_id.clone().into()),
            ("client_secret", self.client_secret.clone().into()),
            ("token_url", self.token_url.clone().into()),
            ("scopes", self.scopes.clone().into()),
            (
                "tls_config",
                self.tls_config.clone().map(|tls| tls.to_object()).into(),
            ),
        ])
    }

    /// The wire object, only when the three credential fields are known.
    pub fn to_wire(&self) -> Option<wire::OAuth2> {
        Some(wire::OAuth2 {
            client_id: self.client_id.known_cloned()?,
            client_secret: self.client_secret.known_cloned()?,
            token_url: self.token_url.known_cloned()?,
            scopes: self.scopes.known_cloned(),
            tls_config: self.tls_config.as_known().map(TlsConfigModel::to_wire),
        })
    }
}

/// One `targets` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetModel {
    /// Endpoints to scrape.
    pub urls: Value<Vec<String>>,
    /// Labels attached to every scraped sample.
    pub labels: Value<BTreeMap<String, String>>,
}

impl TargetModel {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            urls: string_list_attr(obj, "urls", path)?,
            labels: string_map_attr(obj, "labels", path)?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(config: &wire::StaticConfig) -> Self {
        Self {
            urls: Value::Known(config.targets.clone()),
            labels: Value::from_option(config.labels.clone()),
        }
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("urls", self.urls.clone().into()),
            ("labels", self.labels.clone().into()),
        ])
    }

    /// The API representation. The URL list is required.
    pub fn to_wire(&self, path: &str) -> Result<wire::StaticConfig, ProviderError> {
        Ok(wire::StaticConfig {
            targets: required(&self.urls, path, "urls")?,
            labels: self.labels.known_cloned(),
        })
    }
}

/// One `metrics_relabel_configs` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelabelConfigModel {
    /// Labels whose values are concatenated.
    pub source_labels: Value<Vec<String>>,
    /// Separator for the concatenation.
    pub separator: Value<String>,
    /// Label the result is written to.
    pub target_label: Value<String>,
    /// Pattern matched against the concatenation.
    pub regex: Value<String>,
    /// Modulus for `hashmod`.
    pub modulus: Value<i64>,
    /// Replacement value.
    pub replacement: Value<String>,
    /// Relabel action, e.g. `replace`.
    pub action: Value<String>,
}

impl RelabelConfigModel {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            source_labels: string_list_attr(obj, "source_labels", path)?,
            separator: string_attr(obj, "separator", path)?,
            target_label: string_attr(obj, "target_label", path)?,
            regex: string_attr(obj, "regex", path)?,
            modulus: int_attr(obj, "modulus", path)?,
            replacement: string_attr(obj, "replacement", path)?,
            action: string_attr(obj, "action", path)?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(config: &wire::MetricsRelabelConfig, path: &str) -> Result<Self, ProviderError> {
        let modulus = config
            .modulus
            .map(|m| crate::convert::int_from_wire(&crate::convert::join_path(path, "modulus"), m))
            .transpose()?;
        Ok(Self {
            source_labels: Value::Known(config.source_labels.clone()),
            separator: Value::from_option(config.separator.clone()),
            target_label: Value::from_option(config.target_label.clone()),
            regex: Value::from_option(config.regex.clone()),
            modulus: Value::from_option(modulus),
            replacement: Value::from_option(config.replacement.clone()),
            action: Value::from_option(config.action.clone()),
        })
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("source_labels", self.source_labels.clone().into()),
            ("separator", self.separator.clone().into()),
            ("target_label", self.target_label.clone().into()),
            ("regex", self.regex.clone().into()),
            ("modulus", self.modulus.clone().into()),
            ("replacement", self.replacement.clone().into()),
            ("action", self.action.clone().into()),
        ])
    }

    /// The API representation.
    pub fn to_wire(&self, path: &str) -> Result<wire::MetricsRelabelConfig, ProviderError> {
        let modulus = self
            .modulus
            .as_known()
            .map(|m| crate::convert::int_to_wire(&crate::convert::join_path(path, "modulus"), *m))
            .transpose()?;
        Ok(wire::MetricsRelabelConfig {
            source_labels: required(&self.source_labels, path, "source_labels")?,
            separator: self.separator.known_cloned(),
            target_label: self.target_label.known_cloned(),
            regex: self.regex.known_cloned(),
            modulus,
            replacement: self.replacement.known_cloned(),
            action: self.action.known_cloned(),
        })
    }
}

/// One `http_sd_configs` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpSdConfigModel {
    /// Discovery endpoint.
    pub url: Value<String>,
    /// How often to re-query the endpoint.
    pub refresh_interval: Value<String>,
    /// Credentials for the discovery endpoint.
    pub basic_auth: Value<BasicAuthModel>,
    /// TLS settings for the discovery endpoint.
    pub tls_config: Value<TlsConfigModel>,
    /// OAuth2 for the discovery endpoint.
    pub oauth2: Value<OAuth2Model>,
}

impl HttpSdConfigModel {
    /// Decompose the block at `path`.
    pub fn from_object(obj: &ObjectValue, path: &str) -> Result<Self, ProviderError> {
        let nested = |name: &str| crate::convert::join_path(path, name);
        Ok(Self {
            url: string_attr(obj, "url", path)?,
            refresh_interval: string_attr(obj, "refresh_interval", path)?,
            basic_auth: decode_block(
                &object_attr(obj, "basic_auth", path)?,
                &nested("basic_auth"),
                BasicAuthModel::from_object,
            )?,
            tls_config: decode_block(
                &object_attr(obj, "tls_config", path)?,
                &nested("tls_config"),
                TlsConfigModel::from_object,
            )?,
            oauth2: decode_block(
                &object_attr(obj, "oauth2", path)?,
                &nested("oauth2"),
                OAuth2Model::from_object,
            )?,
        })
    }

    /// Build from the API representation.
    pub fn from_wire(config: &wire::HttpSdConfig) -> Self {
        Self {
            url: Value::Known(config.url.clone()),
            refresh_interval: Value::from_option(config.refresh_interval.clone()),
            basic_auth: Value::from_option(config.basic_auth.as_ref().map(BasicAuthModel::from_wire)),
            tls_config: Value::from_option(config.tls_config.as_ref().map(TlsConfigModel::from_wire)),
            oauth2: Value::from_option(config.oauth2.as_ref().map(OAuth2Model::from_wire)),
        }
    }

    /// Recompose the block.
    pub fn to_object(&self) -> ObjectValue {
        encode_object([
            ("url", self.url.clone().into()),
            ("refresh_interval", self.refresh_interval.clone().into()),
            (
                "basic_auth",
                self.basic_auth.clone().map(|b| b.to_object()).into(),
            ),
            (
                "tls_config",
                self.tls_config.clone().map(|t| t.to_object()).into(),
            ),
            ("oauth2", self.oauth2.clone().map(|o| o.to_object()).into()),
        ])
    }

    /// The wire object. The URL is required.
    pub fn to_wire(&self, path: &str) -> Result<wire::HttpSdConfig, ProviderError> {
        let url = required(&self.url, path, "url")?;
        Ok(wire::HttpSdConfig {
            url,
            refresh_interval: self.refresh_interval.known_cloned(),
            basic_auth: self.basic_auth.as_known().and_then(BasicAuthModel::to_wire),
            tls_config: self.tls_config.as_known().map(TlsConfigModel::to_wire),
            oauth2: self.oauth2.as_known().and_then(OAuth2Model::to_wire),
        })
    }
}

/// The known value of a required inner field.
fn required<T: Clone>(value: &Value<T>, path: &str, name: &str) -> Result<T, ProviderError> {
    value.known_cloned().ok_or_else(|| {
        ProviderError::InvalidInput(format!("{} is required", crate::convert::join_path(path, name)))
    })
}

/// Every nested block of a [`ScrapeConfigModel`], decomposed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrapeConfigParts {
    /// Decomposed `saml2`.
    pub saml2: Value<Saml2Model>,
    /// Decomposed `basic_auth`.
    pub basic_auth: Value<BasicAuthModel>,
    /// Decomposed `tls_config`.
    pub tls_config: Value<TlsConfigModel>,
    /// Decomposed `oauth2`.
    pub oauth2: Value<OAuth2Model>,
    /// Decomposed `targets`.
    pub targets: Value<Vec<TargetModel>>,
    /// Decomposed `metrics_relabel_configs`.
    pub metrics_relabel_configs: Value<Vec<RelabelConfigModel>>,
    /// Decomposed `http_sd_configs`.
    pub http_sd_configs: Value<Vec<HttpSdConfigModel>>,
}

impl ScrapeConfigParts {
    /// Decompose every nested block, failing on the first malformed one.
    pub fn from_model(model: &ScrapeConfigModel) -> Result<Self, ProviderError> {
        Ok(Self {
            saml2: decode_block(&model.saml2, "saml2", Saml2Model::from_object)?,
            basic_auth: decode_block(&model.basic_auth, "basic_auth", BasicAuthModel::from_object)?,
            tls_config: decode_block(&model.tls_config, "tls_config", TlsConfigModel::from_object)?,
            oauth2: decode_block(&model.oauth2, "oauth2", OAuth2Model::from_object)?,
            targets: decode_block_list(&model.targets, "targets", TargetModel::from_object)?,
            metrics_relabel_configs: decode_block_list(
                &model.metrics_relabel_configs,
                "metrics_relabel_configs",
                RelabelConfigModel::from_object,
            )?,
            http_sd_configs: decode_block_list(
                &model.http_sd_configs,
                "http_sd_configs",
                HttpSdConfigModel::from_object,
            )?,
        })
    }

    /// The SAML2 flag, when both the block and the flag are known.
    pub fn saml2_flag(&self) -> Option<bool> {
        self.saml2
            .as_known()
            .and_then(|saml2| saml2.enable_url_parameters.known_cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Dynamic;

    #[test]
    fn test_basic_auth_all_or_nothing() {
        let half = BasicAuthModel {
            username: Value::Known("user".to_string()),
            password: Value::Null,
        };
        assert_eq!(half.to_wire(), None);

        let full = BasicAuthModel {
            username: Value::Known("user".to_string()),
            password: Value::Known("pass".to_string()),
        };
        assert_eq!(
            full.to_wire(),
            Some(wire::BasicAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            })
        );
    }

    #[test]
    fn test_oauth2_object_roundtrip() {
        let oauth = OAuth2Model {
            client_id: Value::Known("id".to_string()),
            client_secret: Value::Known("secret".to_string()),
            token_url: Value::Known("https://auth/token".to_string()),
            scopes: Value::Known(vec!["read".to_string(), "write".to_string()]),
            tls_config: Value::Known(TlsConfigModel {
                insecure_skip_verify: Value::Known(true),
            }),
        };

        let decoded = OAuth2Model::from_object(&oauth.to_object(), "oauth2").unwrap();
        assert_eq!(decoded, oauth);
    }

    #[test]
    fn test_oauth2_missing_secret_omitted() {
        let oauth = OAuth2Model {
            client_id: Value::Known("id".to_string()),
            client_secret: Value::Unknown,
            token_url: Value::Known("https://auth/token".to_string()),
            ..Default::default()
        };
        assert_eq!(oauth.to_wire(), None);
    }

    #[test]
    fn test_malformed_nested_block_names_path() {
        let mut model = ScrapeConfigModel::default();
        model.http_sd_configs = Value::Known(vec![encode_object([
            ("url", "https://sd".into()),
            (
                "basic_auth",
                Dynamic::Map(encode_object([("username", Dynamic::Bool(true))])),
            ),
        ])]);

        let err = ScrapeConfigParts::from_model(&model).unwrap_err();
        assert_eq!(err.attribute(), Some("http_sd_configs.0.basic_auth.username"));
    }

    #[test]
    fn test_relabel_modulus_narrowing() {
        let relabel = RelabelConfigModel {
            source_labels: Value::Known(vec!["__name__".to_string()]),
            modulus: Value::Known(i64::MAX),
            ..Default::default()
        };
        let err = relabel.to_wire("metrics_relabel_configs.0").unwrap_err();
        assert_eq!(err.attribute(), Some("metrics_relabel_configs.0.modulus"));
    }

    #[test]
    fn test_target_without_urls_rejected() {
        for urls in [Value::Null, Value::Unknown] {
            let target = TargetModel {
                urls,
                labels: Value::Null,
            };
            let err = target.to_wire("targets.0").unwrap_err();
            assert_eq!(err.to_string(), "Invalid input: targets.0.urls is required");
        }
    }

    #[test]
    fn test_relabel_without_source_labels_rejected() {
        let relabel = RelabelConfigModel {
            action: Value::Known("drop".to_string()),
            ..Default::default()
        };
        let err = relabel.to_wire("metrics_relabel_configs.1").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: metrics_relabel_configs.1.source_labels is required"
        );
    }

    #[test]
    fn test_saml2_flag() {
        let parts = ScrapeConfigParts {
            saml2: Value::Known(Saml2Model {
                enable_url_parameters: Value::Known(false),
            }),
            ..Default::default()
        };
        assert_eq!(parts.saml2_flag(), Some(false));
        assert_eq!(ScrapeConfigParts::default().saml2_flag(), None);
    }
}
