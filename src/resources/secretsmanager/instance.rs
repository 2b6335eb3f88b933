//! The `stratus_secretsmanager_instance` resource.
//!
//! An instance carries a set of ACLs (CIDR ranges allowed to reach it). The
//! API has no bulk update for them: they are reconciled one entry at a time
//! through [`reconcile::sync`](crate::reconcile::sync).

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::client::ApiError;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::identifier::IdFormat;
use crate::provider::{found, ManagedResource, ReadOutcome};
use crate::reconcile::{self, ObservedEntry, SetCollection, SyncReport};
use crate::validation::Validator;
use crate::value::Value;

use super::wire::{
    AclListResponse, AclResponse, CreateAclPayload, CreateInstancePayload, InstanceResponse,
    UpdateInstancePayload,
};

/// Resource type name.
pub const INSTANCE_TYPE: &str = "stratus_secretsmanager_instance";

/// Identifier format `[project_id],[instance_id]`.
pub const INSTANCE_ID: IdFormat = IdFormat::new(&["project_id", "instance_id"]);

/// Configuration model of a secrets manager instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceModel {
    /// Composite identifier `project_id,instance_id`.
    pub id: Value<String>,
    /// Owning project.
    pub project_id: Value<String>,
    /// Server-assigned instance ID.
    pub instance_id: Value<String>,
    /// Display name.
    pub name: Value<String>,
    /// CIDR ranges allowed to access the instance.
    pub acls: Value<BTreeSet<String>>,
}

/// Populate `model` from an instance and its ACL list.
///
/// A missing ACL list maps to a null set, an empty one to an empty set.
/// Entries without a CIDR are skipped, as the ACL reconciler does.
pub fn map_fields(
    instance: Option<&InstanceResponse>,
    acls: Option<&AclListResponse>,
    model: Option<&mut InstanceModel>,
) -> Result<(), ProviderError> {
    let instance =
        instance.ok_or_else(|| ProviderError::InvalidInput("response input is nil".to_string()))?;
    let model =
        model.ok_or_else(|| ProviderError::InvalidInput("model input is nil".to_string()))?;

    let instance_id = match (&instance.id, model.instance_id.as_known()) {
        (Some(id), _) | (None, Some(id)) => id.clone(),
        (None, None) => {
            return Err(ProviderError::InvalidInput(
                "instance id not present".to_string(),
            ))
        },
    };
    let project_id = model
        .project_id
        .known_cloned()
        .ok_or_else(|| ProviderError::InvalidInput("project_id not present in model".to_string()))?;
    let id = INSTANCE_ID.build(&[&project_id, &instance_id])?;

    let acls = match acls.and_then(|list| list.acls.as_ref()) {
        None => Value::Null,
        Some(entries) => Value::Known(
            entries
                .iter()
                .filter_map(|acl| {
                    if acl.cidr.is_none() {
                        warn!(id = ?acl.id, "Ignoring ACL entry without CIDR");
                    }
                    acl.cidr.clone()
                })
                .collect(),
        ),
    };

    model.id = Value::Known(id.to_string());
    model.instance_id = Value::Known(instance_id);
    model.name = Value::from_option(instance.name.clone());
    model.acls = acls;
    Ok(())
}

/// Build the create payload.
pub fn to_create_payload(model: Option<&InstanceModel>) -> Result<CreateInstancePayload, ProviderError> {
    let model = model.ok_or_else(|| ProviderError::InvalidInput("nil model".to_string()))?;
    Ok(CreateInstancePayload {
        name: required_name(model)?,
    })
}

/// Build the update payload.
pub fn to_update_payload(model: Option<&InstanceModel>) -> Result<UpdateInstancePayload, ProviderError> {
    let model = model.ok_or_else(|| ProviderError::InvalidInput("nil model".to_string()))?;
    Ok(UpdateInstancePayload {
        name: required_name(model)?,
    })
}

fn required_name(model: &InstanceModel) -> Result<String, ProviderError> {
    model
        .name
        .known_cloned()
        .ok_or_else(|| ProviderError::InvalidInput("name is required".to_string()))
}

/// The secrets manager API operations the resource needs.
#[async_trait]
pub trait SecretsManagerApi: Send + Sync {
    /// Create an instance; the response carries its ID.
    async fn create_instance(
        &self,
        project_id: &str,
        payload: &CreateInstancePayload,
    ) -> Result<InstanceResponse, ApiError>;

    /// Fetch an instance.
    async fn get_instance(
        &self,
        project_id: &str,
        instance_id: &str,
    ) -> Result<InstanceResponse, ApiError>;

    /// Rename an instance.
    async fn update_instance(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &UpdateInstancePayload,
    ) -> Result<(), ApiError>;

    /// Delete an instance and its ACLs.
    async fn delete_instance(&self, project_id: &str, instance_id: &str) -> Result<(), ApiError>;

    /// List an instance's ACLs.
    async fn list_acls(&self, project_id: &str, instance_id: &str)
        -> Result<AclListResponse, ApiError>;

    /// Add one ACL.
    async fn create_acl(
        &self,
        project_id: &str,
        instance_id: &str,
        payload: &CreateAclPayload,
    ) -> Result<AclResponse, ApiError>;

    /// Remove one ACL by its ID.
    async fn delete_acl(
        &self,
        project_id: &str,
        instance_id: &str,
        acl_id: &str,
    ) -> Result<(), ApiError>;
}

/// One instance's ACLs viewed as a create/delete-only collection keyed by CIDR.
pub struct InstanceAcls<'a, A: ?Sized> {
    api: &'a A,
    project_id: &'a str,
    instance_id: &'a str,
}

impl<'a, A: SecretsManagerApi + ?Sized> InstanceAcls<'a, A> {
    /// View the ACLs of one instance.
    pub fn new(api: &'a A, project_id: &'a str, instance_id: &'a str) -> Self {
        Self {
            api,
            project_id,
            instance_id,
        }
    }
}

#[async_trait]
impl<A: SecretsManagerApi + ?Sized> SetCollection for InstanceAcls<'_, A> {
    async fn list(&self) -> Result<Vec<ObservedEntry>, ApiError> {
        let list = self.api.list_acls(self.project_id, self.instance_id).await?;
        let entries = list
            .acls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|acl| match (acl.cidr, acl.id) {
                (Some(cidr), Some(id)) => Some(ObservedEntry::new(cidr, id)),
                (cidr, id) => {
                    warn!(?cidr, ?id, "Ignoring incomplete ACL entry");
                    None
                },
            })
            .collect();
        Ok(entries)
    }

    async fn create(&self, key: &str) -> Result<(), ApiError> {
        let payload = CreateAclPayload {
            cidr: key.to_string(),
        };
        self.api
            .create_acl(self.project_id, self.instance_id, &payload)
            .await
            .map(|_| ())
    }

    async fn delete(&self, external_id: &str) -> Result<(), ApiError> {
        self.api
            .delete_acl(self.project_id, self.instance_id, external_id)
            .await
    }
}

/// The secrets manager instance resource.
pub struct SecretsManagerInstanceResource<A: ?Sized> {
    api: Arc<A>,
}

impl<A: SecretsManagerApi + ?Sized> SecretsManagerInstanceResource<A> {
    /// Create the resource.
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn sync_acls(
        &self,
        project_id: &str,
        instance_id: &str,
        acls: &Value<BTreeSet<String>>,
    ) -> Result<SyncReport, ProviderError> {
        let Some(desired) = acls.as_known() else {
            debug!(instance_id = %instance_id, "ACLs not configured, leaving them untouched");
            return Ok(SyncReport::default());
        };
        let collection = InstanceAcls::new(&*self.api, project_id, instance_id);
        reconcile::sync(&collection, desired).await
    }

    async fn refresh(
        &self,
        project_id: &str,
        instance_id: &str,
        model: &mut InstanceModel,
    ) -> Result<bool, ProviderError> {
        let Some(instance) = found(self.api.get_instance(project_id, instance_id).await)? else {
            return Ok(false);
        };
        let acls = self.api.list_acls(project_id, instance_id).await?;
        map_fields(Some(&instance), Some(&acls), Some(model))?;
        Ok(true)
    }
}

fn known<'a>(value: &'a Value<String>, field: &str) -> Result<&'a str, ProviderError> {
    value
        .as_known()
        .map(String::as_str)
        .ok_or_else(|| ProviderError::InvalidInput(format!("{} not present in model", field)))
}

#[async_trait]
impl<A: SecretsManagerApi + ?Sized> ManagedResource for SecretsManagerInstanceResource<A> {
    type Model = InstanceModel;

    fn type_name(&self) -> &'static str {
        INSTANCE_TYPE
    }

    fn validate(&self, model: &InstanceModel) -> Vec<Diagnostic> {
        let validator = Validator::new()
            .uuid("project_id", &model.project_id)
            .length("name", &model.name, 1, 63);
        match model.acls.as_known() {
            Some(acls) => validator.cidrs("acls", acls).finish(),
            None => validator.finish(),
        }
    }

    async fn create(&self, planned: InstanceModel) -> Result<InstanceModel, ProviderError> {
        let project_id = known(&planned.project_id, "project_id")?;
        info!(resource_type = INSTANCE_TYPE, "Create called");

        let payload = to_create_payload(Some(&planned))?;
        let created = self.api.create_instance(project_id, &payload).await?;
        let instance_id = created
            .id
            .clone()
            .ok_or_else(|| ProviderError::InvalidInput("created instance has no id".to_string()))?;

        let report = self.sync_acls(project_id, &instance_id, &planned.acls).await?;
        debug!(
            instance_id = %instance_id,
            created = report.created.len(),
            "ACLs applied"
        );

        let mut state = planned.clone();
        state.instance_id = Value::Known(instance_id.clone());
        if !self.refresh(project_id, &instance_id, &mut state).await? {
            return Err(ProviderError::InvalidInput(format!(
                "instance {} vanished right after creation",
                instance_id
            )));
        }

        info!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Create completed successfully");
        Ok(state)
    }

    async fn read(&self, state: InstanceModel) -> Result<ReadOutcome<InstanceModel>, ProviderError> {
        let project_id = known(&state.project_id, "project_id")?;
        let instance_id = known(&state.instance_id, "instance_id")?;
        debug!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Read called");

        let mut refreshed = state.clone();
        if self.refresh(project_id, instance_id, &mut refreshed).await? {
            Ok(ReadOutcome::Refreshed(refreshed))
        } else {
            info!(instance_id = %instance_id, "Instance is gone, removing from state");
            Ok(ReadOutcome::Removed)
        }
    }

    async fn update(
        &self,
        prior: InstanceModel,
        planned: InstanceModel,
    ) -> Result<InstanceModel, ProviderError> {
        let project_id = known(&planned.project_id, "project_id")?;
        let instance_id = known(&prior.instance_id, "instance_id")?;
        info!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Update called");

        if planned.name != prior.name {
            let payload = to_update_payload(Some(&planned))?;
            self.api
                .update_instance(project_id, instance_id, &payload)
                .await?;
        }
        self.sync_acls(project_id, instance_id, &planned.acls).await?;

        let mut state = planned.clone();
        state.instance_id = Value::Known(instance_id.to_string());
        if !self.refresh(project_id, instance_id, &mut state).await? {
            return Err(ProviderError::Api(ApiError::not_found(format!(
                "instance {}",
                instance_id
            ))));
        }

        info!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Update completed successfully");
        Ok(state)
    }

    async fn delete(&self, state: InstanceModel) -> Result<(), ProviderError> {
        let project_id = known(&state.project_id, "project_id")?;
        let instance_id = known(&state.instance_id, "instance_id")?;
        info!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Delete called");

        match self.api.delete_instance(project_id, instance_id).await {
            Ok(()) => {},
            Err(err) if err.is_not_found() => {
                debug!(instance_id = %instance_id, "Instance already deleted");
            },
            Err(err) => return Err(err.into()),
        }

        info!(resource_type = INSTANCE_TYPE, instance_id = %instance_id, "Delete completed successfully");
        Ok(())
    }

    async fn import_state(&self, id: &str) -> Result<InstanceModel, ProviderError> {
        info!(resource_type = INSTANCE_TYPE, id = %id, "Import called");
        let id = INSTANCE_ID.parse(id)?;
        let segment = |i: usize| Value::from_option(id.segment(i).map(str::to_string));

        Ok(InstanceModel {
            id: Value::Known(id.to_string()),
            project_id: segment(0),
            instance_id: segment(1),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySecretsManagerApi;

    const PROJECT: &str = "3b5f7e4c-2a1d-4f8e-9c6b-0d1e2f3a4b5c";

    fn cidrs(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn planned(acls: Value<BTreeSet<String>>) -> InstanceModel {
        InstanceModel {
            project_id: Value::Known(PROJECT.to_string()),
            name: Value::Known("vault".to_string()),
            acls,
            ..Default::default()
        }
    }

    #[test]
    fn test_map_fields() {
        let instance = InstanceResponse {
            id: Some("iid".to_string()),
            name: Some("vault".to_string()),
            secret_count: Some(0),
        };
        let acls = AclListResponse {
            acls: Some(vec![
                AclResponse {
                    id: Some("acl-1".to_string()),
                    cidr: Some("10.0.0.0/24".to_string()),
                },
                AclResponse {
                    id: Some("acl-2".to_string()),
                    cidr: Some("192.168.0.0/16".to_string()),
                },
            ]),
        };
        let mut model = InstanceModel {
            project_id: Value::Known("pid".to_string()),
            ..Default::default()
        };

        map_fields(Some(&instance), Some(&acls), Some(&mut model)).unwrap();

        assert_eq!(model.id, Value::Known("pid,iid".to_string()));
        assert_eq!(model.name, Value::Known("vault".to_string()));
        assert_eq!(
            model.acls,
            Value::Known(cidrs(&["10.0.0.0/24", "192.168.0.0/16"]))
        );
    }

    #[test]
    fn test_nil_acl_list_is_null_set() {
        let instance = InstanceResponse {
            id: Some("iid".to_string()),
            ..Default::default()
        };
        let mut model = InstanceModel {
            project_id: Value::Known("pid".to_string()),
            ..Default::default()
        };

        map_fields(Some(&instance), None, Some(&mut model)).unwrap();
        assert_eq!(model.acls, Value::Null);

        let empty = AclListResponse { acls: Some(vec![]) };
        map_fields(Some(&instance), Some(&empty), Some(&mut model)).unwrap();
        assert_eq!(model.acls, Value::Known(BTreeSet::new()));
    }

    #[test]
    fn test_acl_without_cidr_is_skipped() {
        let instance = InstanceResponse {
            id: Some("iid".to_string()),
            ..Default::default()
        };
        let acls = AclListResponse {
            acls: Some(vec![
                AclResponse {
                    id: Some("acl-1".to_string()),
                    cidr: None,
                },
                AclResponse {
                    id: Some("acl-2".to_string()),
                    cidr: Some("10.0.0.0/24".to_string()),
                },
            ]),
        };
        let mut model = InstanceModel {
            project_id: Value::Known("pid".to_string()),
            ..Default::default()
        };

        map_fields(Some(&instance), Some(&acls), Some(&mut model)).unwrap();
        assert_eq!(model.acls, Value::Known(cidrs(&["10.0.0.0/24"])));
    }

    #[test]
    fn test_map_fields_nil_inputs() {
        let mut model = InstanceModel::default();
        assert!(map_fields(None, None, Some(&mut model)).is_err());
        assert!(map_fields(Some(&InstanceResponse::default()), None, None).is_err());
    }

    #[tokio::test]
    async fn test_create_syncs_acls() {
        let api = Arc::new(MemorySecretsManagerApi::new());
        let resource = SecretsManagerInstanceResource::new(api.clone());

        let state = resource
            .create(planned(Value::Known(cidrs(&["10.0.0.0/24", "10.1.0.0/24"]))))
            .await
            .unwrap();

        let instance_id = state.instance_id.known_cloned().unwrap();
        assert_eq!(state.id, Value::Known(format!("{},{}", PROJECT, instance_id)));
        assert_eq!(
            api.acl_cidrs(PROJECT, &instance_id),
            vec!["10.0.0.0/24".to_string(), "10.1.0.0/24".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_converges_acls() {
        let api = Arc::new(MemorySecretsManagerApi::new());
        let resource = SecretsManagerInstanceResource::new(api.clone());
        let prior = resource
            .create(planned(Value::Known(cidrs(&["a/1", "b/1", "c/1"]))))
            .await
            .unwrap();

        let mut next = prior.clone();
        next.acls = Value::Known(cidrs(&["a/1", "c/1", "d/1"]));
        let state = resource.update(prior, next).await.unwrap();

        assert_eq!(state.acls, Value::Known(cidrs(&["a/1", "c/1", "d/1"])));
    }

    // A failed ACL create leaves the entries handled before it in place.
    #[tokio::test]
    async fn test_update_partial_acl_failure_is_not_rolled_back() {
        let api = Arc::new(MemorySecretsManagerApi::new());
        let resource = SecretsManagerInstanceResource::new(api.clone());
        let prior = resource
            .create(planned(Value::Known(cidrs(&["b/1", "e/1"]))))
            .await
            .unwrap();
        let instance_id = prior.instance_id.known_cloned().unwrap();

        api.fail_create_acl("d/1", ApiError::status(400, "invalid cidr"));
        let mut next = prior.clone();
        next.acls = Value::Known(cidrs(&["a/1", "d/1", "f/1"]));
        let err = resource.update(prior, next).await.unwrap_err();

        assert!(matches!(err, ProviderError::ReconcileStep { .. }));
        assert_eq!(
            api.acl_cidrs(PROJECT, &instance_id),
            vec!["a/1".to_string(), "e/1".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unconfigured_acls_untouched() {
        let api = Arc::new(MemorySecretsManagerApi::new());
        let resource = SecretsManagerInstanceResource::new(api.clone());
        let state = resource
            .create(planned(Value::Known(cidrs(&["10.0.0.0/24"]))))
            .await
            .unwrap();

        let mut next = state.clone();
        next.acls = Value::Null;
        next.name = Value::Known("renamed".to_string());
        let state = resource.update(state, next).await.unwrap();

        assert_eq!(state.name, Value::Known("renamed".to_string()));
        assert_eq!(state.acls, Value::Known(cidrs(&["10.0.0.0/24"])));
    }

    #[tokio::test]
    async fn test_read_and_delete() {
        let api = Arc::new(MemorySecretsManagerApi::new());
        let resource = SecretsManagerInstanceResource::new(api);
        let state = resource.create(planned(Value::Null)).await.unwrap();

        let outcome = resource.read(state.clone()).await.unwrap();
        assert_eq!(outcome.into_model().map(|m| m.name), Some(state.name.clone()));

        resource.delete(state.clone()).await.unwrap();
        assert!(resource.read(state.clone()).await.unwrap().is_removed());
        resource.delete(state).await.unwrap();
    }

    #[tokio::test]
    async fn test_import_state() {
        let resource = SecretsManagerInstanceResource::new(Arc::new(MemorySecretsManagerApi::new()));
        let model = resource.import_state("pid,iid").await.unwrap();
        assert_eq!(model.instance_id, Value::Known("iid".to_string()));

        let err = resource.import_state("pid,iid,extra").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Expected import identifier with format: [project_id],[instance_id] Got: \"pid,iid,extra\""
        );
    }

    #[test]
    fn test_validate_acls() {
        let resource = SecretsManagerInstanceResource::new(Arc::new(MemorySecretsManagerApi::new()));
        let model = planned(Value::Known(cidrs(&["10.0.0.0/24", "not-a-cidr"])));
        let diagnostics = resource.validate(&model);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("acls.1"));
    }
}
