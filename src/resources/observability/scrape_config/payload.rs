//! Model to request payload construction for scrape jobs.
//!
//! Payload fields are copied from the model first. Defaults then fill in
//! every field whose model value is absent, null or unknown; a known model
//! value always wins.

use crate::convert::int_to_wire;
use crate::defaults::ScrapeConfigDefaults;
use crate::error::ProviderError;
use crate::value::{Dynamic, Value};

use super::model::{
    BasicAuthModel, OAuth2Model, ScrapeConfigModel, ScrapeConfigParts, TlsConfigModel,
};
use super::params::{merge_saml2, Params};
use super::wire::{CreateScrapeConfigPayload, UpdateScrapeConfigPayload};

/// The payload fields that carry service defaults.
struct DefaultedFields<'a> {
    scheme: &'a mut Option<String>,
    scrape_interval: &'a mut Option<String>,
    scrape_timeout: &'a mut Option<String>,
    sample_limit: &'a mut Option<f64>,
    params: &'a mut Option<Params>,
}

impl<'a> DefaultedFields<'a> {
    fn of(payload: &'a mut UpdateScrapeConfigPayload) -> Self {
        Self {
            scheme: &mut payload.scheme,
            scrape_interval: &mut payload.scrape_interval,
            scrape_timeout: &mut payload.scrape_timeout,
            sample_limit: &mut payload.sample_limit,
            params: &mut payload.params,
        }
    }

    fn apply(
        self,
        model: &ScrapeConfigModel,
        saml2: Option<bool>,
        defaults: &ScrapeConfigDefaults,
    ) -> Result<(), ProviderError> {
        if !model.sample_limit.is_known() {
            *self.sample_limit = Some(int_to_wire(
                DEFAULT_SAMPLE_LIMIT_PATH,
                defaults.sample_limit,
            )?);
        }
        fill(self.scheme, &model.scheme, || defaults.scheme.clone());
        fill(self.scrape_interval, &model.scrape_interval, || {
            defaults.scrape_interval.clone()
        });
        fill(self.scrape_timeout, &model.scrape_timeout, || {
            defaults.scrape_timeout.clone()
        });
        if saml2.is_none() {
            merge_saml2(self.params, defaults.saml2_enable_url_parameters);
        }
        Ok(())
    }
}

/// Attribute path reported when the default sample limit cannot be sent.
pub const DEFAULT_SAMPLE_LIMIT_PATH: &str = "defaults.scrape_config.sample_limit";

fn fill<T, M>(slot: &mut Option<T>, model: &Value<M>, default: impl FnOnce() -> T) {
    if !model.is_known() {
        *slot = Some(default());
    }
}

/// SAML2 flag as configured, without failing on a malformed block.
fn configured_saml2(model: &ScrapeConfigModel) -> Option<bool> {
    model
        .saml2
        .as_known()
        .and_then(|obj| obj.get("enable_url_parameters"))
        .and_then(|flag| match flag {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        })
}

/// Fill defaults into a create payload.
///
/// Idempotent: running it twice yields the same payload as once. Fails with
/// [`ProviderError::OutOfRange`] when the default sample limit cannot be sent
/// exactly, leaving the payload untouched.
pub fn set_defaults_create(
    payload: &mut CreateScrapeConfigPayload,
    model: &ScrapeConfigModel,
    defaults: &ScrapeConfigDefaults,
) -> Result<(), ProviderError> {
    DefaultedFields::of(&mut payload.settings).apply(model, configured_saml2(model), defaults)
}

/// Fill defaults into an update payload.
pub fn set_defaults_update(
    payload: &mut UpdateScrapeConfigPayload,
    model: &ScrapeConfigModel,
    defaults: &ScrapeConfigDefaults,
) -> Result<(), ProviderError> {
    DefaultedFields::of(payload).apply(model, configured_saml2(model), defaults)
}

/// Build the create payload.
///
/// Fails with [`ProviderError::InvalidInput`] on a missing model or job name,
/// [`ProviderError::Conversion`] on a malformed nested block and
/// [`ProviderError::OutOfRange`] when a count cannot be sent exactly.
pub fn to_create_payload(
    model: Option<&ScrapeConfigModel>,
    defaults: &ScrapeConfigDefaults,
) -> Result<CreateScrapeConfigPayload, ProviderError> {
    let model = model.ok_or_else(|| ProviderError::InvalidInput("nil model".to_string()))?;
    let job_name = model
        .name
        .known_cloned()
        .ok_or_else(|| ProviderError::InvalidInput("name is required".to_string()))?;

    let mut payload = CreateScrapeConfigPayload::new(job_name, settings(model)?);
    set_defaults_create(&mut payload, model, defaults)?;
    Ok(payload)
}

/// Build the update payload. The job name is immutable and left out.
pub fn to_update_payload(
    model: Option<&ScrapeConfigModel>,
    defaults: &ScrapeConfigDefaults,
) -> Result<UpdateScrapeConfigPayload, ProviderError> {
    let model = model.ok_or_else(|| ProviderError::InvalidInput("nil model".to_string()))?;

    let mut payload = settings(model)?;
    set_defaults_update(&mut payload, model, defaults)?;
    Ok(payload)
}

/// Copy every model field shared by both payloads.
fn settings(model: &ScrapeConfigModel) -> Result<UpdateScrapeConfigPayload, ProviderError> {
    let parts = ScrapeConfigParts::from_model(model)?;

    let sample_limit = model
        .sample_limit
        .as_known()
        .map(|limit| int_to_wire("sample_limit", *limit))
        .transpose()?;

    let mut params = None;
    if let Some(flag) = parts.saml2_flag() {
        merge_saml2(&mut params, flag);
    }

    let static_configs = parts
        .targets
        .as_known()
        .map(|targets| {
            targets
                .iter()
                .enumerate()
                .map(|(i, target)| target.to_wire(&format!("targets.{}", i)))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let metrics_relabel_configs = parts
        .metrics_relabel_configs
        .as_known()
        .map(|relabels| {
            relabels
                .iter()
                .enumerate()
                .map(|(i, relabel)| relabel.to_wire(&format!("metrics_relabel_configs.{}", i)))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    let http_sd_configs = parts
        .http_sd_configs
        .as_known()
        .map(|configs| {
            configs
                .iter()
                .enumerate()
                .map(|(i, config)| config.to_wire(&format!("http_sd_configs.{}", i)))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(UpdateScrapeConfigPayload {
        metrics_path: model.metrics_path.known_cloned(),
        scheme: model.scheme.known_cloned(),
        scrape_interval: model.scrape_interval.known_cloned(),
        scrape_timeout: model.scrape_timeout.known_cloned(),
        sample_limit,
        params,
        basic_auth: parts.basic_auth.as_known().and_then(BasicAuthModel::to_wire),
        tls_config: parts.tls_config.as_known().map(TlsConfigModel::to_wire),
        oauth2: parts.oauth2.as_known().and_then(OAuth2Model::to_wire),
        static_configs,
        metrics_relabel_configs,
        http_sd_configs,
        honor_labels: model.honor_labels.known_cloned(),
        honor_timestamps: model.honor_timestamps.known_cloned(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::convert::MAX_EXACT_FLOAT_INT;
    use crate::resources::observability::scrape_config::mapper::map_fields;
    use crate::resources::observability::scrape_config::model::{
        HttpSdConfigModel, Saml2Model, TargetModel,
    };
    use crate::resources::observability::scrape_config::wire::{
        BasicAuth, HttpSdConfig, MetricsRelabelConfig, OAuth2, ScrapeConfigResponse,
        StaticConfig, TlsConfig,
    };

    fn defaults() -> ScrapeConfigDefaults {
        ScrapeConfigDefaults::default()
    }

    fn named_model() -> ScrapeConfigModel {
        ScrapeConfigModel {
            project_id: Value::Known("pid".to_string()),
            instance_id: Value::Known("iid".to_string()),
            name: Value::Known("svc".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_nil_model() {
        let err = to_create_payload(None, &defaults()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInput(_)));
        assert!(to_update_payload(None, &defaults()).is_err());
    }

    #[test]
    fn test_defaults_fill_unset_fields() {
        let payload = to_create_payload(Some(&named_model()), &defaults()).unwrap();
        let settings = &payload.settings;

        assert_eq!(payload.job_name, "svc");
        assert_eq!(settings.scheme.as_deref(), Some("https"));
        assert_eq!(settings.scrape_interval.as_deref(), Some("5m"));
        assert_eq!(settings.scrape_timeout.as_deref(), Some("2m"));
        assert_eq!(settings.sample_limit, Some(5000.0));
        assert_eq!(
            settings.params,
            Some(Params::from([("saml2".to_string(), vec!["enabled".to_string()])]))
        );
        assert_eq!(settings.metrics_path, None);
    }

    #[test]
    fn test_model_value_wins_over_default() {
        let mut model = named_model();
        model.scheme = Value::Known("http".to_string());
        model.sample_limit = Value::Known(100);
        model.saml2 = Value::Known(
            Saml2Model {
                enable_url_parameters: Value::Known(false),
            }
            .to_object(),
        );

        let payload = to_update_payload(Some(&model), &defaults()).unwrap();
        assert_eq!(payload.scheme.as_deref(), Some("http"));
        assert_eq!(payload.sample_limit, Some(100.0));
        assert_eq!(
            payload.params,
            Some(Params::from([("saml2".to_string(), vec!["disabled".to_string()])]))
        );
    }

    #[test]
    fn test_unknown_takes_default() {
        let mut model = named_model();
        model.scrape_interval = Value::Unknown;
        let payload = to_update_payload(Some(&model), &defaults()).unwrap();
        assert_eq!(payload.scrape_interval.as_deref(), Some("5m"));
    }

    #[test]
    fn test_alternate_default_profile() {
        let profile = ScrapeConfigDefaults {
            scheme: "http".to_string(),
            sample_limit: 42,
            saml2_enable_url_parameters: false,
            ..Default::default()
        };
        let payload = to_update_payload(Some(&named_model()), &profile).unwrap();
        assert_eq!(payload.scheme.as_deref(), Some("http"));
        assert_eq!(payload.sample_limit, Some(42.0));
        assert_eq!(
            payload.params,
            Some(Params::from([("saml2".to_string(), vec!["disabled".to_string()])]))
        );
    }

    #[test]
    fn test_default_injection_is_idempotent() {
        let model = named_model();
        let mut once = to_create_payload(Some(&model), &defaults()).unwrap();
        let snapshot = once.clone();
        set_defaults_create(&mut once, &model, &defaults()).unwrap();
        assert_eq!(once, snapshot);

        let mut update = to_update_payload(Some(&model), &defaults()).unwrap();
        let snapshot = update.clone();
        set_defaults_update(&mut update, &model, &defaults()).unwrap();
        set_defaults_update(&mut update, &model, &defaults()).unwrap();
        assert_eq!(update, snapshot);
    }

    #[test]
    fn test_saml2_default_merges_into_params() {
        let mut payload = UpdateScrapeConfigPayload {
            params: Some(Params::from([(
                "module".to_string(),
                vec!["http_2xx".to_string()],
            )])),
            ..Default::default()
        };
        set_defaults_update(&mut payload, &named_model(), &defaults()).unwrap();

        let params = payload.params.unwrap();
        assert_eq!(params["module"], vec!["http_2xx".to_string()]);
        assert_eq!(params["saml2"], vec!["enabled".to_string()]);
    }

    #[test]
    fn test_sample_limit_out_of_range() {
        let mut model = named_model();
        model.sample_limit = Value::Known(MAX_EXACT_FLOAT_INT + 1);
        let err = to_create_payload(Some(&model), &defaults()).unwrap_err();
        assert!(matches!(err, ProviderError::OutOfRange { .. }));
        assert_eq!(err.attribute(), Some("sample_limit"));
    }

    #[test]
    fn test_default_sample_limit_out_of_range() {
        let profile = ScrapeConfigDefaults {
            sample_limit: i64::MAX,
            ..Default::default()
        };
        let err = to_create_payload(Some(&named_model()), &profile).unwrap_err();
        assert!(matches!(err, ProviderError::OutOfRange { value: i64::MAX, .. }));
        assert_eq!(err.attribute(), Some(DEFAULT_SAMPLE_LIMIT_PATH));

        let mut model = named_model();
        model.sample_limit = Value::Known(10);
        let payload = to_create_payload(Some(&model), &profile).unwrap();
        assert_eq!(payload.settings.sample_limit, Some(10.0));
    }

    #[test]
    fn test_target_without_urls_rejected() {
        let mut model = named_model();
        model.targets = Value::Known(vec![TargetModel {
            urls: Value::Null,
            labels: Value::Null,
        }
        .to_object()]);
        let err = to_create_payload(Some(&model), &defaults()).unwrap_err();
        assert_eq!(err.message(), "targets.0.urls is required");
    }

    #[test]
    fn test_half_filled_basic_auth_omitted() {
        let mut model = named_model();
        model.basic_auth = Value::Known(
            BasicAuthModel {
                username: Value::Known("user".to_string()),
                password: Value::Null,
            }
            .to_object(),
        );
        let payload = to_create_payload(Some(&model), &defaults()).unwrap();
        assert_eq!(payload.settings.basic_auth, None);
    }

    #[test]
    fn test_empty_list_stays_empty() {
        let mut model = named_model();
        model.targets = Value::Known(vec![]);
        model.http_sd_configs = Value::Null;

        let payload = to_update_payload(Some(&model), &defaults()).unwrap();
        assert_eq!(payload.static_configs, Some(vec![]));
        assert_eq!(payload.http_sd_configs, None);
    }

    #[test]
    fn test_update_payload_has_no_job_name() {
        let payload = to_update_payload(Some(&named_model()), &defaults()).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("jobName").is_none());
    }

    #[test]
    fn test_http_sd_without_url_rejected() {
        let mut model = named_model();
        model.http_sd_configs = Value::Known(vec![HttpSdConfigModel {
            refresh_interval: Value::Known("60s".to_string()),
            ..Default::default()
        }
        .to_object()]);
        let err = to_update_payload(Some(&model), &defaults()).unwrap_err();
        assert!(err.to_string().contains("http_sd_configs.0.url"));
    }

    // Every create-settable field the API returned survives
    // response -> model -> create payload.
    #[test]
    fn test_roundtrip_through_model() {
        let tls = TlsConfig {
            insecure_skip_verify: Some(true),
        };
        let response = ScrapeConfigResponse {
            job_name: Some("svc".to_string()),
            metrics_path: Some("/metrics".to_string()),
            scheme: Some("http".to_string()),
            scrape_interval: Some("1m".to_string()),
            scrape_timeout: Some("30s".to_string()),
            sample_limit: Some(1234.0),
            params: Some(Params::from([(
                "saml2".to_string(),
                vec!["disabled".to_string()],
            )])),
            basic_auth: Some(BasicAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
            tls_config: Some(tls.clone()),
            oauth2: Some(OAuth2 {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                token_url: "https://auth/token".to_string(),
                scopes: Some(vec!["b".to_string(), "a".to_string()]),
                tls_config: Some(tls.clone()),
            }),
            static_configs: Some(vec![
                StaticConfig {
                    targets: vec!["url2".to_string(), "url1".to_string()],
                    labels: Some(BTreeMap::from([("k1".to_string(), "v1".to_string())])),
                },
                StaticConfig {
                    targets: vec!["url3".to_string()],
                    labels: None,
                },
            ]),
            metrics_relabel_configs: Some(vec![MetricsRelabelConfig {
                source_labels: vec!["__name__".to_string()],
                separator: Some(";".to_string()),
                target_label: Some("shard".to_string()),
                regex: Some("(.*)".to_string()),
                modulus: Some(4.0),
                replacement: Some("$1".to_string()),
                action: Some("hashmod".to_string()),
            }]),
            http_sd_configs: Some(vec![HttpSdConfig {
                url: "https://sd/targets".to_string(),
                refresh_interval: Some("60s".to_string()),
                basic_auth: None,
                tls_config: Some(tls),
                oauth2: None,
            }]),
            honor_labels: Some(true),
            honor_timestamps: Some(false),
        };

        let mut model = ScrapeConfigModel {
            project_id: Value::Known("pid".to_string()),
            instance_id: Value::Known("iid".to_string()),
            ..Default::default()
        };
        map_fields(Some(&response), Some(&mut model)).unwrap();
        let payload = to_create_payload(Some(&model), &defaults()).unwrap();
        let settings = &payload.settings;

        assert_eq!(Some(payload.job_name.clone()), response.job_name);
        assert_eq!(settings.metrics_path, response.metrics_path);
        assert_eq!(settings.scheme, response.scheme);
        assert_eq!(settings.scrape_interval, response.scrape_interval);
        assert_eq!(settings.scrape_timeout, response.scrape_timeout);
        assert_eq!(settings.sample_limit, response.sample_limit);
        assert_eq!(settings.params, response.params);
        assert_eq!(settings.basic_auth, response.basic_auth);
        assert_eq!(settings.tls_config, response.tls_config);
        assert_eq!(settings.oauth2, response.oauth2);
        assert_eq!(settings.static_configs, response.static_configs);
        assert_eq!(settings.metrics_relabel_configs, response.metrics_relabel_configs);
        assert_eq!(settings.http_sd_configs, response.http_sd_configs);
        assert_eq!(settings.honor_labels, response.honor_labels);
        assert_eq!(settings.honor_timestamps, response.honor_timestamps);
    }
}
