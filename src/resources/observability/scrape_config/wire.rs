//! Wire representation of observability scrape jobs.
//!
//! Response objects carry `Option` on every field: `None` means the API did
//! not return the field, which is distinct from an empty collection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::params::Params;

/// HTTP basic authentication credentials. Both halves are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicAuth {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

/// TLS client settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Skip verification of the target's certificate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_verify: Option<bool>,
}

/// OAuth2 client credentials flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2 {
    /// Client ID.
    pub client_id: String,
    /// Client secret.
    pub client_secret: String,
    /// Token endpoint.
    pub token_url: String,
    /// Requested scopes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scopes: Option<Vec<String>>,
    /// TLS settings for the token endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
}

/// A static target group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticConfig {
    /// Target URLs.
    pub targets: Vec<String>,
    /// Labels attached to every target of the group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// A metrics relabeling rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsRelabelConfig {
    /// Labels whose values are concatenated.
    pub source_labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Modulus for `hashmod`; the API models it as a float.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modulus: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// An HTTP service discovery source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSdConfig {
    /// Discovery endpoint.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2>,
}

/// A scrape job as returned by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeConfigResponse {
    pub job_name: Option<String>,
    pub metrics_path: Option<String>,
    pub scheme: Option<String>,
    pub scrape_interval: Option<String>,
    pub scrape_timeout: Option<String>,
    pub sample_limit: Option<f64>,
    pub params: Option<Params>,
    pub basic_auth: Option<BasicAuth>,
    pub tls_config: Option<TlsConfig>,
    pub oauth2: Option<OAuth2>,
    pub static_configs: Option<Vec<StaticConfig>>,
    pub metrics_relabel_configs: Option<Vec<MetricsRelabelConfig>>,
    pub http_sd_configs: Option<Vec<HttpSdConfig>>,
    pub honor_labels: Option<bool>,
    pub honor_timestamps: Option<bool>,
}

/// Request body for updating a scrape job.
///
/// The job name is immutable and travels in the request path only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScrapeConfigPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Params>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<BasicAuth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_config: Option<TlsConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth2: Option<OAuth2>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_configs: Option<Vec<StaticConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_relabel_configs: Option<Vec<MetricsRelabelConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_sd_configs: Option<Vec<HttpSdConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honor_labels: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub honor_timestamps: Option<bool>,
}

/// Request body for creating a scrape job.
///
/// Every settable field of the update payload plus the job name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateScrapeConfigPayload {
    pub job_name: String,
    #[serde(flatten)]
    pub settings: UpdateScrapeConfigPayload,
}

impl CreateScrapeConfigPayload {
    /// Create a payload for `job_name` with the given settings.
    pub fn new(job_name: impl Into<String>, settings: UpdateScrapeConfigPayload) -> Self {
        Self {
            job_name: job_name.into(),
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_response_decodes_camel_case() {
        let response: ScrapeConfigResponse = serde_json::from_value(json!({
            "jobName": "svc",
            "metricsPath": "/metrics",
            "sampleLimit": 5000.0,
            "staticConfigs": [{"targets": ["url1"], "labels": {"k1": "v1"}}],
            "params": {"saml2": ["enabled"]}
        }))
        .unwrap();

        assert_eq!(response.job_name.as_deref(), Some("svc"));
        assert_eq!(response.sample_limit, Some(5000.0));
        assert_eq!(response.static_configs.as_ref().map(Vec::len), Some(1));
        assert_eq!(response.http_sd_configs, None);
    }

    #[test]
    fn test_empty_list_is_distinct_from_missing() {
        let response: ScrapeConfigResponse =
            serde_json::from_value(json!({"staticConfigs": []})).unwrap();
        assert_eq!(response.static_configs, Some(vec![]));
        assert_eq!(response.metrics_relabel_configs, None);
    }

    #[test]
    fn test_create_payload_flattens_settings() {
        let payload = CreateScrapeConfigPayload::new(
            "svc",
            UpdateScrapeConfigPayload {
                scheme: Some("https".to_string()),
                static_configs: Some(vec![]),
                ..Default::default()
            },
        );

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({"jobName": "svc", "scheme": "https", "staticConfigs": []})
        );
    }
}
