//! Testing utilities for resource implementations.
//!
//! This module provides in-memory API fakes and a lifecycle harness so that
//! resources can be exercised without a live backend.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use stratus_provider::resources::secretsmanager::SecretsManagerInstanceResource;
//! use stratus_provider::testing::{MemorySecretsManagerApi, ResourceTester};
//!
//! #[tokio::test]
//! async fn test_instance_lifecycle() {
//!     let api = Arc::new(MemorySecretsManagerApi::new());
//!     let tester = ResourceTester::new(SecretsManagerInstanceResource::new(api));
//!
//!     let state = tester.lifecycle_create(planned()).await.unwrap();
//!     assert!(state.id.is_known());
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::ApiError;
use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::error::ProviderError;
use crate::provider::{ManagedResource, ReadOutcome};
use crate::reconcile::{ObservedEntry, SetCollection};
use crate::resources::observability::scrape_config::wire::{
    CreateScrapeConfigPayload, ScrapeConfigResponse, UpdateScrapeConfigPayload,
};
use crate::resources::observability::scrape_config::ScrapeConfigApi;
use crate::resources::secretsmanager::wire::{
    AclListResponse, AclResponse, CreateAclPayload, CreateInstancePayload, InstanceResponse,
    UpdateInstancePayload,
};
use crate::resources::secretsmanager::SecretsManagerApi;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn generated_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =========================================================================
// Set collection
// =========================================================================

/// An in-memory create/delete-only collection with injectable failures.
///
/// Failures stay armed until [`clear_failures`](Self::clear_failures).
#[derive(Default)]
pub struct MemoryAclCollection {
    entries: Mutex<BTreeMap<String, String>>,
    failures: Mutex<AclFailures>,
    creates: AtomicUsize,
    deletes: AtomicUsize,
}

#[derive(Default)]
struct AclFailures {
    list: Option<ApiError>,
    create: BTreeMap<String, ApiError>,
    delete: BTreeMap<String, ApiError>,
}

impl MemoryAclCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a collection already holding `keys`.
    pub fn with_entries(keys: &[&str]) -> Self {
        let collection = Self::new();
        {
            let mut entries = lock(&collection.entries);
            for key in keys {
                entries.insert(key.to_string(), generated_id());
            }
        }
        collection
    }

    /// Keys currently present, sorted.
    pub fn keys(&self) -> Vec<String> {
        lock(&self.entries).keys().cloned().collect()
    }

    /// Number of successful creates.
    pub fn create_calls(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of successful deletes.
    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every list fail.
    pub fn fail_list(&self, error: ApiError) {
        lock(&self.failures).list = Some(error);
    }

    /// Make creating `key` fail.
    pub fn fail_create_of(&self, key: &str, error: ApiError) {
        lock(&self.failures).create.insert(key.to_string(), error);
    }

    /// Make deleting the entry for `key` fail.
    pub fn fail_delete_of(&self, key: &str, error: ApiError) {
        lock(&self.failures).delete.insert(key.to_string(), error);
    }

    /// Disarm every injected failure.
    pub fn clear_failures(&self) {
        *lock(&self.failures) = AclFailures::default();
    }
}

#[async_trait]
impl SetCollection for MemoryAclCollection {
    async fn list(&self) -> Result<Vec<ObservedEntry>, ApiError> {
        if let Some(err) = &lock(&self.failures).list {
            return Err(err.clone());
        }
        Ok(lock(&self.entries)
            .iter()
            .map(|(key, id)| ObservedEntry::new(key.as_str(), id.as_str()))
            .collect())
    }

    async fn create(&self, key: &str) -> Result<(), ApiError> {
        if let Some(err) = lock(&self.failures).create.get(key) {
            return Err(err.clone());
        }
        lock(&self.entries).insert(key.to_string(), generated_id());
        self.creates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, external_id: &str) -> Result<(), ApiError> {
        let mut entries = lock(&self.entries);
        let key = entries
            .iter()
            .find(|(_, id)| id.as_str() == external_id)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| ApiError::not_found(format!("entry {}", external_id)))?;
        if let Some(err) = lock(&self.failures).delete.get(&key) {
            return Err(err.clone());
        }
        entries.remove(&key);
        self.deletes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =========================================================================
// Observability API
// =========================================================================

/// One stored scrape job.
///
/// Writes land in `pending` and become visible after `polls_left` further
/// observations, mimicking the asynchronous API. A pending `None` is a
/// deletion.
#[derive(Default)]
struct StoredJob {
    current: Option<ScrapeConfigResponse>,
    pending: Option<(Option<ScrapeConfigResponse>, usize)>,
}

impl StoredJob {
    fn observe(&mut self) -> Option<&ScrapeConfigResponse> {
        match self.pending.take() {
            Some((target, 0)) => self.current = target,
            Some((target, left)) => self.pending = Some((target, left - 1)),
            None => {},
        }
        self.current.as_ref()
    }

    fn exists(&self) -> bool {
        match &self.pending {
            Some((target, _)) => target.is_some(),
            None => self.current.is_some(),
        }
    }
}

type JobKey = (String, String, String);

/// An in-memory observability API where writes apply asynchronously.
#[derive(Default)]
pub struct MemoryScrapeConfigApi {
    jobs: Mutex<BTreeMap<JobKey, StoredJob>>,
    pending_polls: AtomicUsize,
    list_calls: AtomicUsize,
    next_failure: Mutex<Option<ApiError>>,
}

impl MemoryScrapeConfigApi {
    /// Create an empty API where writes are visible on the next read.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay the visibility of every write by `polls` observations.
    pub fn with_pending_polls(self, polls: usize) -> Self {
        self.set_pending_polls(polls);
        self
    }

    /// Change the visibility delay of subsequent writes.
    pub fn set_pending_polls(&self, polls: usize) {
        self.pending_polls.store(polls, Ordering::SeqCst);
    }

    /// How many times `list` was called.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Fail the next call, whichever it is.
    pub fn fail_next(&self, error: ApiError) {
        *lock(&self.next_failure) = Some(error);
    }

    fn injected(&self) -> Result<(), ApiError> {
        match lock(&self.next_failure).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn schedule(&self, job: &mut StoredJob, target: Option<ScrapeConfigResponse>) {
        job.pending = Some((target, self.pending_polls.load(Ordering::SeqCst)));
    }
}

fn key(project_id: &str, instance_id: &str, job_name: &str) -> JobKey {
    (
        project_id.to_string(),
        instance_id.to_string(),
        job_name.to_string(),
    )
}

/// What the API stores for a job written with `settings`.
fn stored_response(job_name: &str, settings: &UpdateScrapeConfigPayload) -> ScrapeConfigResponse {
    let settings = settings.clone();
    ScrapeConfigResponse {
        job_name: Some(job_name.to_string()),
        metrics_path: settings.metrics_path,
        scheme: settings.scheme,
        scrape_interval: settings.scrape_interval,
        scrape_timeout: settings.scrape_timeout,
        sample_limit: settings.sample_limit,
        params: settings.params,
        basic_auth: settings.basic_auth,
        tls_config: settings.tls_config,
        oauth2: settings.oauth2,
        static_configs: settings.static_configs,
        metrics_relabel_configs: settings.metrics_relabel_configs,
        http_sd_configs: settings.http_sd_configs,
        honor_labels: settings.honor_labels,
        honor_timestamps: settings.honor_timestamps,
    }
}

#[async_trait]
impl ScrapeConfigApi for MemoryScrapeConfigApi {
    async fn get(
        &self,
        project_id: &str,
        instance_id: &str,
        job_name: &str,
    ) -> Result<ScrapeConfigResponse, ApiError> {
        self.injected()?;
        let mut jobs = lock(&self.jobs);
        jobs.get_mut(&key(project_id, instance_id, job_name))
            .and_then(|job| job.observe().cloned())
            .ok_or_else(|| ApiError::not_found(format!("scrape config {}", job_name)))
    }

    async fn create(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &CreateScrapeConfigPayload,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut jobs = lock(&self.jobs);
        let job = jobs
            .entry(key(project_id, instance_id, &payload.job_name))
            .or_default();
        if job.exists() {
            return Err(ApiError::status(409, format!("job {} exists", payload.job_name)));
        }
        self.schedule(job, Some(stored_response(&payload.job_name, &payload.settings)));
        Ok(())
    }

    async fn update(
        &self,
        project_id: &str,
        instance_id: &str,
        job_name: &str,
        payload: &UpdateScrapeConfigPayload,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&key(project_id, instance_id, job_name)) {
            Some(job) if job.exists() => {
                self.schedule(job, Some(stored_response(job_name, payload)));
                Ok(())
            },
            _ => Err(ApiError::not_found(format!("scrape config {}", job_name))),
        }
    }

    async fn delete(
        &self,
        project_id: &str,
        instance_id: &str,
        job_name: &str,
    ) -> Result<(), ApiError> {
        self.injected()?;
        let mut jobs = lock(&self.jobs);
        match jobs.get_mut(&key(project_id, instance_id, job_name)) {
            Some(job) if job.exists() => {
                self.schedule(job, None);
                Ok(())
            },
            _ => Err(ApiError::not_found(format!("scrape config {}", job_name))),
        }
    }

    async fn list(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<Vec<ScrapeConfigResponse>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.injected()?;
        let mut jobs = lock(&self.jobs);
        Ok(jobs
            .iter_mut()
            .filter(|((pid, iid, _), _)| pid == project_id && iid == instance_id)
            .filter_map(|(_, job)| job.observe().cloned())
            .collect())
    }
}

// =========================================================================
// Secrets manager API
// =========================================================================

#[derive(Debug, Clone)]
struct StoredInstance {
    name: String,
    acls: Vec<AclResponse>,
}

/// An in-memory secrets manager API.
#[derive(Default)]
pub struct MemorySecretsManagerApi {
    instances: Mutex<BTreeMap<(String, String), StoredInstance>>,
    acl_failures: Mutex<BTreeMap<String, ApiError>>,
}

impl MemorySecretsManagerApi {
    /// Create an empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// CIDRs of an instance's ACLs, sorted. Empty for unknown instances.
    pub fn acl_cidrs(&self, project_id: &str, instance_id: &str) -> Vec<String> {
        let instances = lock(&self.instances);
        let mut cidrs: Vec<String> = instances
            .get(&(project_id.to_string(), instance_id.to_string()))
            .map(|instance| instance.acls.iter().filter_map(|acl| acl.cidr.clone()).collect())
            .unwrap_or_default();
        cidrs.sort();
        cidrs
    }

    /// Make creating an ACL for `cidr` fail.
    pub fn fail_create_acl(&self, cidr: &str, error: ApiError) {
        lock(&self.acl_failures).insert(cidr.to_string(), error);
    }

    fn with_instance<T>(
        &self,
        project_id: &str,
        instance_id: &str,
        f: impl FnOnce(&mut StoredInstance) -> T,
    ) -> Result<T, ApiError> {
        let mut instances = lock(&self.instances);
        instances
            .get_mut(&(project_id.to_string(), instance_id.to_string()))
            .map(f)
            .ok_or_else(|| ApiError::not_found(format!("instance {}", instance_id)))
    }
}

#[async_trait]
impl SecretsManagerApi for MemorySecretsManagerApi {
    async fn create_instance(
        &self,
        project_id: &str,
        payload: &CreateInstancePayload,
    ) -> Result<InstanceResponse, ApiError> {
        let id = generated_id();
        lock(&self.instances).insert(
            (project_id.to_string(), id.clone()),
            StoredInstance {
                name: payload.name.clone(),
                acls: Vec::new(),
            },
        );
        Ok(InstanceResponse {
            id: Some(id),
            name: Some(payload.name.clone()),
            secret_count: Some(0),
        })
    }

    async fn get_instance(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<InstanceResponse, ApiError> {
        self.with_instance(project_id, instance_id, |instance| InstanceResponse {
            id: Some(instance_id.to_string()),
            name: Some(instance.name.clone()),
            secret_count: Some(0),
        })
    }

    async fn update_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &UpdateInstancePayload,
    ) -> Result<(), ApiError> {
        self.with_instance(project_id, instance_id, |instance| {
            instance.name = payload.name.clone();
        })
    }

    async fn delete_instance(&self, project_id: &str, instance_id: &str) -> Result<(), ApiError> {
        lock(&self.instances)
            .remove(&(project_id.to_string(), instance_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("instance {}", instance_id)))
    }

    async fn list_acls(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<AclListResponse, ApiError> {
        self.with_instance(project_id, instance_id, |instance| AclListResponse {
            acls: Some(instance.acls.clone()),
        })
    }

    async fn create_acl(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &CreateAclPayload,
    ) -> Result<AclResponse, ApiError> {
        if let Some(err) = lock(&self.acl_failures).get(&payload.cidr) {
            return Err(err.clone());
        }
        let acl = AclResponse {
            id: Some(generated_id()),
            cidr: Some(payload.cidr.clone()),
        };
        self.with_instance(project_id, instance_id, |instance| {
            instance.acls.push(acl.clone());
        })?;
        Ok(acl)
    }

    async fn delete_acl(
        &self,
        project_id: &str,
        instance_id: &str,
        acl_id: &str,
    ) -> Result<(), ApiError> {
        let removed = self.with_instance(project_id, instance_id, |instance| {
            let before = instance.acls.len();
            instance.acls.retain(|acl| acl.id.as_deref() != Some(acl_id));
            before != instance.acls.len()
        })?;
        if removed {
            Ok(())
        } else {
            Err(ApiError::not_found(format!("acl {}", acl_id)))
        }
    }
}

// =========================================================================
// Lifecycle harness
// =========================================================================

/// A test harness driving a [`ManagedResource`] through its lifecycle.
pub struct ResourceTester<R: ManagedResource> {
    resource: R,
}

impl<R: ManagedResource> ResourceTester<R> {
    /// Create a new tester for the given resource.
    pub fn new(resource: R) -> Self {
        Self { resource }
    }

    /// Get a reference to the underlying resource.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Validate a model, failing on error diagnostics.
    pub fn validate(&self, model: &R::Model) -> Result<(), TestError> {
        check_diagnostics(self.resource.validate(model))
    }

    /// Validate and create.
    pub async fn create(&self, planned: R::Model) -> Result<R::Model, TestError> {
        self.validate(&planned)?;
        Ok(self.resource.create(planned).await?)
    }

    /// Read, returning `None` when the object is gone.
    pub async fn read(&self, state: R::Model) -> Result<Option<R::Model>, TestError> {
        Ok(self.resource.read(state).await?.into_model())
    }

    /// Validate and update.
    pub async fn update(&self, prior: R::Model, planned: R::Model) -> Result<R::Model, TestError> {
        self.validate(&planned)?;
        Ok(self.resource.update(prior, planned).await?)
    }

    /// Delete.
    pub async fn delete(&self, state: R::Model) -> Result<(), TestError> {
        Ok(self.resource.delete(state).await?)
    }

    /// Import from a composite identifier.
    pub async fn import(&self, id: &str) -> Result<R::Model, TestError> {
        Ok(self.resource.import_state(id).await?)
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Create, then read back, failing if the object is not found.
    pub async fn lifecycle_create(&self, planned: R::Model) -> Result<R::Model, TestError> {
        let created = self.create(planned).await?;
        match self.resource.read(created).await? {
            ReadOutcome::Refreshed(state) => Ok(state),
            ReadOutcome::Removed => Err(TestError::Unexpected(format!(
                "{} missing right after create",
                self.resource.type_name()
            ))),
        }
    }

    /// Delete, then read back, failing if the object is still there.
    pub async fn lifecycle_delete(&self, state: R::Model) -> Result<(), TestError> {
        self.delete(state.clone()).await?;
        if self.resource.read(state).await?.is_removed() {
            Ok(())
        } else {
            Err(TestError::Unexpected(format!(
                "{} still present after delete",
                self.resource.type_name()
            )))
        }
    }

    /// Run create, read, update and delete in sequence.
    ///
    /// `change` derives the planned update from the created state.
    pub async fn lifecycle_crud(
        &self,
        planned: R::Model,
        change: impl FnOnce(&R::Model) -> R::Model + Send,
    ) -> Result<R::Model, TestError> {
        let created = self.lifecycle_create(planned).await?;
        let next = change(&created);
        let updated = self.update(created, next).await?;
        self.lifecycle_delete(updated.clone()).await?;
        Ok(updated)
    }
}

/// Error type for test operations that may fail with diagnostics.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
    /// The resource behaved in a way the harness did not expect.
    Unexpected(String),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    writeln!(f, "  [{:?}] {}", diag.severity, diag)?;
                }
                Ok(())
            },
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::Unexpected(msg) => write!(f, "Unexpected: {}", msg),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

/// Check diagnostics and return an error if there are any errors.
fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| d.to_string()).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    let has_errors = diagnostics
        .iter()
        .any(|d| matches!(d.severity, DiagnosticSeverity::Error));

    assert!(has_errors, "Expected at least one error, but got none");
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}

/// Assert that an error diagnostic is attached to the given attribute path.
///
/// # Panics
///
/// Panics if no error diagnostic carries that attribute.
pub fn assert_error_at(diagnostics: &[Diagnostic], attribute: &str) {
    let found = diagnostics
        .iter()
        .any(|d| d.is_error() && d.attribute.as_deref() == Some(attribute));

    assert!(
        found,
        "Expected an error at '{}', but got errors at {:?}",
        attribute,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.attribute.as_deref())
            .collect::<Vec<_>>()
    );
}
