//! Service default values, one profile per resource type.
//!
//! Defaults are injected into payloads only where the configuration leaves a
//! field absent, null or unknown. The table is plain data so callers can load
//! an alternate profile from provider configuration or build one in tests.

use serde::{Deserialize, Serialize};

/// Default scrape scheme.
pub const DEFAULT_SCHEME: &str = "https";
/// Default scrape interval.
pub const DEFAULT_SCRAPE_INTERVAL: &str = "5m";
/// Default scrape timeout.
pub const DEFAULT_SCRAPE_TIMEOUT: &str = "2m";
/// Default per-scrape sample limit.
pub const DEFAULT_SAMPLE_LIMIT: i64 = 5000;
/// Default SAML2 URL parameter behaviour.
pub const DEFAULT_SAML2_ENABLE_URL_PARAMETERS: bool = true;

/// Defaults applied to scrape configuration payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScrapeConfigDefaults {
    /// Scheme used when none is configured.
    pub scheme: String,
    /// Scrape interval used when none is configured.
    pub scrape_interval: String,
    /// Scrape timeout used when none is configured.
    pub scrape_timeout: String,
    /// Sample limit used when none is configured.
    pub sample_limit: i64,
    /// Whether SAML2 URL parameters are enabled when not configured.
    pub saml2_enable_url_parameters: bool,
}

impl Default for ScrapeConfigDefaults {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            scrape_interval: DEFAULT_SCRAPE_INTERVAL.to_string(),
            scrape_timeout: DEFAULT_SCRAPE_TIMEOUT.to_string(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            saml2_enable_url_parameters: DEFAULT_SAML2_ENABLE_URL_PARAMETERS,
        }
    }
}

/// The defaults table.
///
/// Each field is the profile for one resource type. Unknown profiles are
/// rejected when decoding.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsTable {
    /// Profile for observability scrape configs.
    pub scrape_config: ScrapeConfigDefaults,
}

impl DefaultsTable {
    /// Create a table holding the service defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the scrape config profile.
    pub fn with_scrape_config(mut self, defaults: ScrapeConfigDefaults) -> Self {
        self.scrape_config = defaults;
        self
    }

    /// The profile for scrape configs.
    pub fn scrape_config(&self) -> &ScrapeConfigDefaults {
        &self.scrape_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_defaults() {
        let table = DefaultsTable::new();
        let defaults = table.scrape_config();
        assert_eq!(defaults.scheme, "https");
        assert_eq!(defaults.scrape_interval, "5m");
        assert_eq!(defaults.scrape_timeout, "2m");
        assert_eq!(defaults.sample_limit, 5000);
        assert!(defaults.saml2_enable_url_parameters);
    }

    #[test]
    fn test_partial_profile_from_json() {
        let table: DefaultsTable = serde_json::from_value(json!({
            "scrape_config": {"scheme": "http", "sample_limit": 100}
        }))
        .unwrap();

        assert_eq!(table.scrape_config().scheme, "http");
        assert_eq!(table.scrape_config().sample_limit, 100);
        assert_eq!(table.scrape_config().scrape_interval, "5m");
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let result: Result<DefaultsTable, _> = serde_json::from_value(json!({
            "load_balancer": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_profiles_serialize_by_resource_name() {
        let table = DefaultsTable::new().with_scrape_config(ScrapeConfigDefaults {
            sample_limit: 7,
            ..Default::default()
        });
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["scrape_config"]["sample_limit"], json!(7));
        assert_eq!(value.as_object().unwrap().len(), 1);
    }
}
