//! Response to model mapping for scrape jobs.

use crate::convert::{decode_block_list, encode_object_list, int_from_wire};
use crate::error::ProviderError;
use crate::value::{ObjectValue, Value};

use super::model::{
    BasicAuthModel, HttpSdConfigModel, OAuth2Model, RelabelConfigModel, Saml2Model,
    ScrapeConfigModel, TargetModel, TlsConfigModel,
};
use super::params::saml2_from_params;
use super::wire::ScrapeConfigResponse;
use super::SCRAPE_CONFIG_ID;

/// Populate `model` from `response`.
///
/// `model` supplies the parent identifiers and any prior values that must
/// survive a response that omits them. Nothing is written unless the whole
/// response maps cleanly.
pub fn map_fields(
    response: Option<&ScrapeConfigResponse>,
    model: Option<&mut ScrapeConfigModel>,
) -> Result<(), ProviderError> {
    let response =
        response.ok_or_else(|| ProviderError::InvalidInput("response input is nil".to_string()))?;
    let model =
        model.ok_or_else(|| ProviderError::InvalidInput("model input is nil".to_string()))?;

    let name = match (&response.job_name, model.name.as_known()) {
        (Some(name), _) => name.clone(),
        (None, Some(name)) => name.clone(),
        (None, None) => {
            return Err(ProviderError::InvalidInput(
                "scrape config name not present".to_string(),
            ))
        },
    };
    let project_id = required(&model.project_id, "project_id")?;
    let instance_id = required(&model.instance_id, "instance_id")?;
    let id = SCRAPE_CONFIG_ID.build(&[project_id, instance_id, &name])?;

    let sample_limit = response
        .sample_limit
        .map(|limit| int_from_wire("sample_limit", limit))
        .transpose()?;

    // The API drops the parameter when it sits at its default, which is
    // enabled. An enabled flag the user never configured stays null.
    let configured = matches!(model.saml2, Value::Known(_) | Value::Unknown);
    let flag = saml2_from_params(response.params.as_ref()).unwrap_or(true);
    let saml2 = if !flag || configured {
        Value::Known(
            Saml2Model {
                enable_url_parameters: Value::Known(flag),
            }
            .to_object(),
        )
    } else {
        Value::Null
    };

    let targets = match &response.static_configs {
        None => Value::Null,
        Some(configs) => {
            let prior = decode_block_list(&model.targets, "targets", TargetModel::from_object)?;
            let prior = prior.as_known().map(Vec::as_slice).unwrap_or_default();
            let targets: Vec<TargetModel> = configs
                .iter()
                .enumerate()
                .map(|(i, config)| {
                    let mut target = TargetModel::from_wire(config);
                    let prior_empty_labels = prior
                        .get(i)
                        .and_then(|p| p.labels.as_known())
                        .is_some_and(|labels| labels.is_empty());
                    if config.labels.is_none() && prior_empty_labels {
                        target.labels = Value::Known(Default::default());
                    }
                    target
                })
                .collect();
            Value::Known(encode_object_list(&targets, TargetModel::to_object))
        },
    };

    let metrics_relabel_configs = match &response.metrics_relabel_configs {
        None => Value::Null,
        Some(configs) => {
            let relabels = configs
                .iter()
                .enumerate()
                .map(|(i, config)| {
                    RelabelConfigModel::from_wire(config, &format!("metrics_relabel_configs.{}", i))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Value::Known(encode_object_list(&relabels, RelabelConfigModel::to_object))
        },
    };

    let http_sd_configs = list_or_null(response.http_sd_configs.as_deref(), |config| {
        HttpSdConfigModel::from_wire(config).to_object()
    });

    *model = ScrapeConfigModel {
        id: Value::Known(id.to_string()),
        project_id: model.project_id.clone(),
        instance_id: model.instance_id.clone(),
        name: Value::Known(name),
        metrics_path: Value::from_option(response.metrics_path.clone()),
        scheme: Value::from_option(response.scheme.clone()),
        scrape_interval: Value::from_option(response.scrape_interval.clone()),
        scrape_timeout: Value::from_option(response.scrape_timeout.clone()),
        sample_limit: Value::from_option(sample_limit),
        saml2,
        basic_auth: block_or_null(response.basic_auth.as_ref(), |auth| {
            BasicAuthModel::from_wire(auth).to_object()
        }),
        tls_config: block_or_null(response.tls_config.as_ref(), |tls| {
            TlsConfigModel::from_wire(tls).to_object()
        }),
        oauth2: block_or_null(response.oauth2.as_ref(), |oauth| {
            OAuth2Model::from_wire(oauth).to_object()
        }),
        targets,
        metrics_relabel_configs,
        http_sd_configs,
        honor_labels: Value::from_option(response.honor_labels),
        honor_timestamps: Value::from_option(response.honor_timestamps),
    };
    Ok(())
}

fn required<'a>(value: &'a Value<String>, name: &str) -> Result<&'a str, ProviderError> {
    value
        .as_known()
        .map(String::as_str)
        .ok_or_else(|| ProviderError::InvalidInput(format!("{} not present in model", name)))
}

fn block_or_null<W>(wire: Option<&W>, encode: impl FnOnce(&W) -> ObjectValue) -> Value<ObjectValue> {
    Value::from_option(wire.map(encode))
}

fn list_or_null<W>(wire: Option<&[W]>, encode: impl Fn(&W) -> ObjectValue) -> Value<Vec<ObjectValue>> {
    Value::from_option(wire.map(|items| items.iter().map(encode).collect()))
}
