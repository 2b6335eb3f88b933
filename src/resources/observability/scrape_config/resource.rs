//! Lifecycle of the `stratus_observability_scrapeconfig` resource.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::ApiError;
use crate::config::ProviderConfig;
use crate::defaults::ScrapeConfigDefaults;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::provider::{found, ManagedResource, ReadOutcome};
use crate::validation::Validator;
use crate::value::Value;
use crate::wait::{PollStatus, WaitHandler};

use super::mapper::map_fields;
use super::payload::{to_create_payload, to_update_payload};
use super::params::Params;
use super::wire::{
    BasicAuth, CreateScrapeConfigPayload, HttpSdConfig, OAuth2, ScrapeConfigResponse, TlsConfig,
    UpdateScrapeConfigPayload,
};
use super::{ScrapeConfigModel, SCRAPE_CONFIG_ID};

/// Resource type name.
pub const SCRAPE_CONFIG_TYPE: &str = "stratus_observability_scrapeconfig";

/// The observability API operations the resource needs.
#[async_trait]
pub trait ScrapeConfigApi: Send + Sync {
    /// Fetch one scrape job.
    async fn get(
        &self,
        project_id: &str,
        instance_id: &str,
        job_name: &str,
    ) -> Result<ScrapeConfigResponse, ApiError>;

    /// Create a scrape job. The job appears asynchronously.
    async fn create(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &CreateScrapeConfigPayload,
    ) -> Result<(), ApiError>;

    /// Replace a scrape job's settings. The change applies asynchronously.
    async fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        job_name: &str,
        payload: &UpdateScrapeConfigPayload,
    ) -> Result<(), ApiError>;

    /// Delete a scrape job.
    async fn delete(&self, project_id: &str, instance_id: &str, job_name: &str)
        -> Result<(), ApiError>;

    /// List every scrape job of an instance.
    async fn list(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<Vec<ScrapeConfigResponse>, ApiError>;
}

/// The scrape config resource.
pub struct ScrapeConfigResource<A: ?Sized> {
    api: Arc<A>,
    defaults: ScrapeConfigDefaults,
    waiter: WaitHandler,
}

impl<A: ScrapeConfigApi + ?Sized> ScrapeConfigResource<A> {
    /// Create the resource with the service defaults and default waiting.
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            defaults: ScrapeConfigDefaults::default(),
            waiter: WaitHandler::default(),
        }
    }

    /// Create the resource from provider configuration.
    pub fn from_config(api: Arc<A>, config: &ProviderConfig, waiter: WaitHandler) -> Self {
        Self {
            api,
            defaults: config.defaults.scrape_config().clone(),
            waiter,
        }
    }

    /// Replace the wait handler.
    pub fn with_wait_handler(mut self, waiter: WaitHandler) -> Self {
        self.waiter = waiter;
        self
    }

    async fn fetch(&self, scope: &Scope<'_>) -> Result<ScrapeConfigResponse, ProviderError> {
        Ok(self
            .api
            .get(scope.project_id, scope.instance_id, scope.name)
            .await?)
    }
}

/// The three identifying attributes, borrowed from a model.
struct Scope<'a> {
    project_id: &'a str,
    instance_id: &'a str,
    name: &'a str,
}

impl<'a> Scope<'a> {
    fn of(model: &'a ScrapeConfigModel) -> Result<Self, ProviderError> {
        let get = |value: &'a Value<String>, field: &str| {
            value
                .as_known()
                .map(String::as_str)
                .ok_or_else(|| ProviderError::InvalidInput(format!("{} not present in model", field)))
        };
        Ok(Self {
            project_id: get(&model.project_id, "project_id")?,
            instance_id: get(&model.instance_id, "instance_id")?,
            name: get(&model.name, "name")?,
        })
    }
}

/// Whether a job reflects every setting an update sent.
///
/// Secrets may be redacted in responses, so auth blocks are compared on the
/// parts the API echoes back.
fn reflects(job: &ScrapeConfigResponse, payload: &UpdateScrapeConfigPayload) -> bool {
    fn settled<T: PartialEq>(sent: &Option<T>, seen: &Option<T>) -> bool {
        sent.is_none() || sent == seen
    }

    fn settled_by<T, K: PartialEq>(sent: &Option<T>, seen: &Option<T>, echo: impl Fn(&T) -> K) -> bool {
        match (sent, seen) {
            (None, _) => true,
            (Some(sent), Some(seen)) => echo(sent) == echo(seen),
            (Some(_), None) => false,
        }
    }

    fn params_settled(sent: &Option<Params>, seen: &Option<Params>) -> bool {
        let Some(sent) = sent else {
            return true;
        };
        let seen = seen.as_ref();
        sent.iter()
            .all(|(key, values)| seen.and_then(|seen| seen.get(key)) == Some(values))
    }

    fn basic_auth_echo(auth: &BasicAuth) -> String {
        auth.username.clone()
    }

    type OAuth2Echo = (String, String, Option<Vec<String>>, Option<TlsConfig>);
    type HttpSdEcho = (String, Option<String>, Option<String>, Option<TlsConfig>, Option<OAuth2Echo>);

    fn oauth2_echo(oauth: &OAuth2) -> OAuth2Echo {
        (
            oauth.client_id.clone(),
            oauth.token_url.clone(),
            oauth.scopes.clone(),
            oauth.tls_config.clone(),
        )
    }

    fn http_sd_echo(config: &HttpSdConfig) -> HttpSdEcho {
        (
            config.url.clone(),
            config.refresh_interval.clone(),
            config.basic_auth.as_ref().map(basic_auth_echo),
            config.tls_config.clone(),
            config.oauth2.as_ref().map(oauth2_echo),
        )
    }

    settled(&payload.metrics_path, &job.metrics_path)
        && settled(&payload.scheme, &job.scheme)
        && settled(&payload.scrape_interval, &job.scrape_interval)
        && settled(&payload.scrape_timeout, &job.scrape_timeout)
        && settled(&payload.sample_limit, &job.sample_limit)
        && params_settled(&payload.params, &job.params)
        && settled_by(&payload.basic_auth, &job.basic_auth, basic_auth_echo)
        && settled(&payload.tls_config, &job.tls_config)
        && settled_by(&payload.oauth2, &job.oauth2, oauth2_echo)
        && settled(&payload.static_configs, &job.static_configs)
        && settled(&payload.metrics_relabel_configs, &job.metrics_relabel_configs)
        && settled_by(&payload.http_sd_configs, &job.http_sd_configs, |configs: &Vec<HttpSdConfig>| {
            configs.iter().map(http_sd_echo).collect::<Vec<_>>()
        })
        && settled(&payload.honor_labels, &job.honor_labels)
        && settled(&payload.honor_timestamps, &job.honor_timestamps)
}

#[async_trait]
impl<A: ScrapeConfigApi + ?Sized> ManagedResource for ScrapeConfigResource<A> {
    type Model = ScrapeConfigModel;

    fn type_name(&self) -> &'static str {
        SCRAPE_CONFIG_TYPE
    }

    fn validate(&self, model: &ScrapeConfigModel) -> Vec<Diagnostic> {
        Validator::new()
            .uuid("project_id", &model.project_id)
            .uuid("instance_id", &model.instance_id)
            .length("name", &model.name, 1, 200)
            .length("metrics_path", &model.metrics_path, 1, 200)
            .one_of("scheme", &model.scheme, &["http", "https"])
            .duration("scrape_interval", &model.scrape_interval)
            .duration("scrape_timeout", &model.scrape_timeout)
            .finish()
    }

    async fn create(&self, planned: ScrapeConfigModel) -> Result<ScrapeConfigModel, ProviderError> {
        let scope = Scope::of(&planned)?;
        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %scope.name, "Create called");

        let payload = to_create_payload(Some(&planned), &self.defaults)?;
        self.api
            .create(scope.project_id, scope.instance_id, &payload)
            .await?;

        let api = &*self.api;
        let (project_id, instance_id, name) = (scope.project_id, scope.instance_id, scope.name);
        self.waiter
            .wait("scrape config creation", move || async move {
                let jobs = api.list(project_id, instance_id).await?;
                let listed = jobs.iter().any(|job| job.job_name.as_deref() == Some(name));
                Ok::<_, ApiError>(if listed {
                    PollStatus::Done(())
                } else {
                    PollStatus::Pending
                })
            })
            .await?;

        let response = self.fetch(&scope).await?;
        let mut state = planned.clone();
        map_fields(Some(&response), Some(&mut state))?;

        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %name, "Create completed successfully");
        Ok(state)
    }

    async fn read(
        &self,
        state: ScrapeConfigModel,
    ) -> Result<ReadOutcome<ScrapeConfigModel>, ProviderError> {
        let scope = Scope::of(&state)?;
        debug!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %scope.name, "Read called");

        let lookup = self
            .api
            .get(scope.project_id, scope.instance_id, scope.name)
            .await;
        let Some(response) = found(lookup)? else {
            info!(job_name = %scope.name, "Scrape config is gone, removing from state");
            return Ok(ReadOutcome::Removed);
        };

        let mut refreshed = state.clone();
        map_fields(Some(&response), Some(&mut refreshed))?;
        Ok(ReadOutcome::Refreshed(refreshed))
    }

    async fn update(
        &self,
        _prior: ScrapeConfigModel,
        planned: ScrapeConfigModel,
    ) -> Result<ScrapeConfigModel, ProviderError> {
        let scope = Scope::of(&planned)?;
        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %scope.name, "Update called");

        let payload = to_update_payload(Some(&planned), &self.defaults)?;
        self.api
            .update(scope.project_id, scope.instance_id, scope.name, &payload)
            .await?;

        // The API signals no completion for updates; poll until the job
        // reflects what was sent.
        let api = &*self.api;
        let sent = &payload;
        let (project_id, instance_id, name) = (scope.project_id, scope.instance_id, scope.name);
        let response = self
            .waiter
            .wait("scrape config update", move || async move {
                let job = api.get(project_id, instance_id, name).await?;
                Ok::<_, ApiError>(if reflects(&job, sent) {
                    PollStatus::Done(job)
                } else {
                    PollStatus::Pending
                })
            })
            .await?;

        let mut state = planned.clone();
        map_fields(Some(&response), Some(&mut state))?;

        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %name, "Update completed successfully");
        Ok(state)
    }

    async fn delete(&self, state: ScrapeConfigModel) -> Result<(), ProviderError> {
        let scope = Scope::of(&state)?;
        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %scope.name, "Delete called");

        match self
            .api
            .delete(scope.project_id, scope.instance_id, scope.name)
            .await
        {
            Ok(()) => {},
            Err(err) if err.is_not_found() => {
                debug!(job_name = %scope.name, "Scrape config already deleted");
                return Ok(());
            },
            Err(err) => return Err(err.into()),
        }

        let api = &*self.api;
        let (project_id, instance_id, name) = (scope.project_id, scope.instance_id, scope.name);
        self.waiter
            .wait("scrape config deletion", move || async move {
                match api.get(project_id, instance_id, name).await {
                    Ok(_) => Ok(PollStatus::Pending),
                    Err(err) if err.is_not_found() => Ok(PollStatus::Done(())),
                    Err(err) => Err(err),
                }
            })
            .await?;

        info!(resource_type = SCRAPE_CONFIG_TYPE, job_name = %name, "Delete completed successfully");
        Ok(())
    }

    async fn import_state(&self, id: &str) -> Result<ScrapeConfigModel, ProviderError> {
        info!(resource_type = SCRAPE_CONFIG_TYPE, id = %id, "Import called");
        let id = SCRAPE_CONFIG_ID.parse(id)?;
        let segment = |i: usize| Value::from_option(id.segment(i).map(str::to_string));

        Ok(ScrapeConfigModel {
            id: Value::Known(id.to_string()),
            project_id: segment(0),
            instance_id: segment(1),
            name: segment(2),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::resources::observability::scrape_config::model::BasicAuthModel;
    use crate::testing::MemoryScrapeConfigApi;

    const PROJECT: &str = "3b5f7e4c-2a1d-4f8e-9c6b-0d1e2f3a4b5c";
    const INSTANCE: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";

    fn planned(name: &str) -> ScrapeConfigModel {
        ScrapeConfigModel {
            project_id: Value::Known(PROJECT.to_string()),
            instance_id: Value::Known(INSTANCE.to_string()),
            name: Value::Known(name.to_string()),
            metrics_path: Value::Known("/metrics".to_string()),
            ..Default::default()
        }
    }

    fn resource(api: Arc<MemoryScrapeConfigApi>) -> ScrapeConfigResource<MemoryScrapeConfigApi> {
        ScrapeConfigResource::new(api).with_wait_handler(
            WaitHandler::new(Duration::from_secs(60)).with_poll_interval(Duration::from_secs(1)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_waits_until_listed() {
        let api = Arc::new(MemoryScrapeConfigApi::new().with_pending_polls(2));
        let resource = resource(api.clone());

        let state = resource.create(planned("svc")).await.unwrap();

        assert_eq!(
            state.id,
            Value::Known(format!("{},{},svc", PROJECT, INSTANCE))
        );
        assert_eq!(state.scheme, Value::Known("https".to_string()));
        assert_eq!(state.sample_limit, Value::Known(5000));
        assert!(api.list_calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_polls_until_applied() {
        let api = Arc::new(MemoryScrapeConfigApi::new());
        let resource = resource(api.clone());
        let created = resource.create(planned("svc")).await.unwrap();

        api.set_pending_polls(2);
        let mut next = created.clone();
        next.scrape_interval = Value::Known("1m".to_string());
        let state = resource.update(created, next).await.unwrap();

        assert_eq!(state.scrape_interval, Value::Known("1m".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_of_basic_auth_only_waits_until_applied() {
        let api = Arc::new(MemoryScrapeConfigApi::new());
        let resource = resource(api.clone());
        let created = resource.create(planned("svc")).await.unwrap();

        api.set_pending_polls(1);
        let auth = BasicAuthModel {
            username: Value::Known("u".to_string()),
            password: Value::Known("p".to_string()),
        }
        .to_object();
        let mut next = created.clone();
        next.basic_auth = Value::Known(auth.clone());
        let state = resource.update(created, next).await.unwrap();

        assert_eq!(state.basic_auth, Value::Known(auth));
    }

    #[test]
    fn test_reflects_compares_echoed_auth_fields() {
        let sent = UpdateScrapeConfigPayload {
            basic_auth: Some(BasicAuth {
                username: "u".to_string(),
                password: "p".to_string(),
            }),
            params: Some(Params::from([("saml2".to_string(), vec!["disabled".to_string()])])),
            ..Default::default()
        };
        let mut job = ScrapeConfigResponse {
            job_name: Some("svc".to_string()),
            ..Default::default()
        };
        assert!(!reflects(&job, &sent));

        job.basic_auth = Some(BasicAuth {
            username: "u".to_string(),
            password: String::new(),
        });
        assert!(!reflects(&job, &sent), "params not applied yet");

        job.params = Some(Params::from([
            ("saml2".to_string(), vec!["disabled".to_string()]),
            ("module".to_string(), vec!["http_2xx".to_string()]),
        ]));
        assert!(reflects(&job, &sent));

        job.basic_auth = Some(BasicAuth {
            username: "other".to_string(),
            password: "p".to_string(),
        });
        assert!(!reflects(&job, &sent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_after_delete_removes() {
        let api = Arc::new(MemoryScrapeConfigApi::new());
        let resource = resource(api.clone());
        let state = resource.create(planned("svc")).await.unwrap();

        resource.delete(state.clone()).await.unwrap();
        let outcome = resource.read(state).await.unwrap();
        assert!(outcome.is_removed());
    }

    #[tokio::test]
    async fn test_delete_of_missing_job_succeeds() {
        let api = Arc::new(MemoryScrapeConfigApi::new());
        resource(api).delete(planned("ghost")).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_failure_surfaces() {
        let api = Arc::new(MemoryScrapeConfigApi::new());
        api.fail_next(ApiError::status(500, "internal"));
        let err = resource(api).create(planned("svc")).await.unwrap_err();
        assert_eq!(err.to_string(), "Calling API: HTTP 500: internal");
    }

    #[tokio::test]
    async fn test_import_state() {
        let resource = resource(Arc::new(MemoryScrapeConfigApi::new()));
        let model = resource.import_state("pid,iid,name").await.unwrap();
        assert_eq!(model.id, Value::Known("pid,iid,name".to_string()));
        assert_eq!(model.project_id, Value::Known("pid".to_string()));
        assert_eq!(model.instance_id, Value::Known("iid".to_string()));
        assert_eq!(model.name, Value::Known("name".to_string()));

        for bad in ["pid,iid", "pid,,name"] {
            let err = resource.import_state(bad).await.unwrap_err();
            assert!(matches!(err, ProviderError::ImportFormat { .. }));
        }
    }

    #[test]
    fn test_validate_reports_attribute_paths() {
        let resource = resource(Arc::new(MemoryScrapeConfigApi::new()));
        let mut model = planned("svc");
        model.project_id = Value::Known("not-a-uuid".to_string());
        model.scrape_interval = Value::Known("five minutes".to_string());

        let attributes: Vec<_> = resource
            .validate(&model)
            .into_iter()
            .filter_map(|d| d.attribute)
            .collect();
        assert_eq!(attributes, vec!["project_id", "scrape_interval"]);
    }
}
