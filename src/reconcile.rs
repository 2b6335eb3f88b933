//! Create/delete-only set reconciliation.
//!
//! Some child collections (instance ACLs being the canonical case) have no
//! update operation: entries are identified by a natural key such as a CIDR,
//! and converging the collection means creating missing keys and deleting
//! surplus ones.
//!
//! [`sync`] lists the collection once, builds a [`ReconcilePlan`] from the
//! union of desired and observed keys, then issues one call per differing
//! entry. It is not transactional: if a call fails, processing
//! stops and the error surfaces, but entries already created or deleted keep
//! their new state. A later run against the new observed state picks up where
//! the failed one stopped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::client::ApiError;
use crate::error::ProviderError;

/// An entry currently present in the external collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEntry {
    /// The natural key (e.g. a CIDR).
    pub key: String,
    /// The system-generated ID used to delete the entry.
    pub external_id: String,
}

impl ObservedEntry {
    /// Create an observed entry.
    pub fn new(key: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            external_id: external_id.into(),
        }
    }
}

/// A collection that supports only list, create and delete.
#[async_trait]
pub trait SetCollection: Send + Sync {
    /// List every entry currently in the collection.
    async fn list(&self) -> Result<Vec<ObservedEntry>, ApiError>;

    /// Create an entry for `key`.
    async fn create(&self, key: &str) -> Result<(), ApiError>;

    /// Delete the entry with the given external ID.
    async fn delete(&self, external_id: &str) -> Result<(), ApiError>;
}

/// What a reconciliation pass does with one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Desired but not observed.
    Create,
    /// Observed but not desired.
    Delete,
    /// Desired and observed.
    Keep,
}

/// One key of the desired/observed union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledEntry {
    /// The natural key.
    pub key: String,
    /// Whether the key is in the desired set.
    pub desired: bool,
    /// The external ID, when the key was observed.
    pub external_id: Option<String>,
}

impl ReconciledEntry {
    /// The action this entry needs.
    pub fn lifecycle(&self) -> Lifecycle {
        match (self.desired, &self.external_id) {
            (true, None) => Lifecycle::Create,
            (false, Some(_)) => Lifecycle::Delete,
            _ => Lifecycle::Keep,
        }
    }
}

/// The union of desired and observed keys for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    entries: BTreeMap<String, ReconciledEntry>,
}

impl ReconcilePlan {
    /// Build a plan: every desired key starts as not yet created, then every
    /// observed key is marked created with its external ID.
    pub fn new<I, S>(desired: I, observed: Vec<ObservedEntry>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: BTreeMap<String, ReconciledEntry> = desired
            .into_iter()
            .map(|key| {
                let key = key.as_ref().to_string();
                let entry = ReconciledEntry {
                    key: key.clone(),
                    desired: true,
                    external_id: None,
                };
                (key, entry)
            })
            .collect();

        for observed in observed {
            entries
                .entry(observed.key.clone())
                .and_modify(|entry| entry.external_id = Some(observed.external_id.clone()))
                .or_insert_with(|| ReconciledEntry {
                    key: observed.key.clone(),
                    desired: false,
                    external_id: Some(observed.external_id.clone()),
                });
        }

        Self { entries }
    }

    /// All entries, ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = &ReconciledEntry> {
        self.entries.values()
    }

    /// Keys that need creating.
    pub fn to_create(&self) -> Vec<&str> {
        self.entries()
            .filter(|e| e.lifecycle() == Lifecycle::Create)
            .map(|e| e.key.as_str())
            .collect()
    }

    /// Keys that need deleting.
    pub fn to_delete(&self) -> Vec<&str> {
        self.entries()
            .filter(|e| e.lifecycle() == Lifecycle::Delete)
            .map(|e| e.key.as_str())
            .collect()
    }

    /// Whether the pass has nothing to do.
    pub fn is_noop(&self) -> bool {
        self.entries().all(|e| e.lifecycle() == Lifecycle::Keep)
    }
}

/// What a successful [`sync`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Keys created, in processing order.
    pub created: Vec<String>,
    /// Keys deleted, in processing order.
    pub deleted: Vec<String>,
}

impl SyncReport {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }
}

/// Converge `collection` to exactly the `desired` keys.
///
/// Fails with [`ProviderError::Fetch`] if the initial list fails, and with
/// [`ProviderError::ReconcileStep`] on the first failing create or delete.
/// Nothing is rolled back.
pub async fn sync<C, I, S>(collection: &C, desired: I) -> Result<SyncReport, ProviderError>
where
    C: SetCollection + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let desired: Vec<String> = desired
        .into_iter()
        .map(|key| key.as_ref().to_string())
        .collect();
    let observed = collection.list().await.map_err(ProviderError::Fetch)?;
    let plan = ReconcilePlan::new(&desired, observed);

    if plan.is_noop() {
        debug!("Collection already converged");
        return Ok(SyncReport::default());
    }

    let mut report = SyncReport::default();
    for entry in plan.entries() {
        let result = match (entry.lifecycle(), &entry.external_id) {
            (Lifecycle::Create, _) => {
                debug!(key = %entry.key, "Creating entry");
                collection
                    .create(&entry.key)
                    .await
                    .map(|()| report.created.push(entry.key.clone()))
                    .map_err(|source| ("Creating", source))
            },
            (Lifecycle::Delete, Some(external_id)) => {
                debug!(key = %entry.key, external_id = %external_id, "Deleting entry");
                collection
                    .delete(external_id)
                    .await
                    .map(|()| report.deleted.push(entry.key.clone()))
                    .map_err(|source| ("Deleting", source))
            },
            _ => Ok(()),
        };

        if let Err((action, source)) = result {
            warn!(
                key = %entry.key,
                created = report.created.len(),
                deleted = report.deleted.len(),
                "Reconciliation stopped, earlier changes were kept"
            );
            return Err(ProviderError::ReconcileStep {
                action,
                key: entry.key.clone(),
                source,
            });
        }
    }

    info!(
        created = report.created.len(),
        deleted = report.deleted.len(),
        "Collection reconciled"
    );
    Ok(report)
}
