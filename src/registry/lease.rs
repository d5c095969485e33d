//! Lease management.
//!
//! The [`LeaseManager`] owns every registry operation the API layer calls:
//! registration, heartbeat, deletion and reads. It holds no locks and no
//! mutable state of its own; per-key atomicity is the store's, and every
//! multi-step sequence below tolerates the records it touches vanishing
//! half-way through, whether by concurrent deletion or by expiry.
//!
//! # Leases
//!
//! A node is granted `default_ttl` on registration and on every heartbeat.
//! Any other resource is granted the same length capped at its node's
//! remaining lease, and each heartbeat on the node resets the node and its
//! whole subtree to one shared deadline.

use super::descendants::DescendantQuery;
use super::extension::{ExtensionExtractor, ExtensionFields, EXTENSION_MARKER};
use super::fields;
use super::hierarchy::{registered_as, HierarchyResolver};
use super::kind::ResourceKind;
use super::saga::MetadataSaga;
use super::washout::{WashoutMirror, WashoutRecord};
use crate::core::config::RegistryConfig;
use crate::core::error::{RegistryError, RegistryResult, StoreError};
use crate::core::time::{Clock, Timestamp};
use crate::store::{Body, DocumentStore, Metadata};
use serde_json::Value;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// Registered kind.
    pub kind: ResourceKind,
    /// Resource key.
    pub key: String,
    /// Body as stored, with extension fields removed.
    pub body: Body,
    /// Root node owning the resource.
    pub node_id: String,
    /// False when an existing registration was overwritten.
    pub created: bool,
    /// Expiry deadline granted to the record.
    pub expires_at: Timestamp,
}

/// A registered resource with its metadata sidecar.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub kind: ResourceKind,
    pub body: Body,
    pub metadata: Metadata,
    pub expires_at: Timestamp,
}

/// Outcome of a successful deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    /// The deleted resource.
    pub key: String,
    /// Descendants removed along with it, sorted.
    pub removed: Vec<String>,
}

/// What a registration found at its key before writing.
enum Prior {
    Absent,
    Registered { created_at: Option<Value> },
}

/// Registry operations over a primary store and its washout mirror.
pub struct LeaseManager {
    /// Lease lengths and rename table.
    config: RegistryConfig,

    /// Primary registry store.
    store: Arc<dyn DocumentStore>,

    /// Grace-window shadow copies.
    mirror: WashoutMirror,

    /// Time source shared with the stores.
    clock: Arc<dyn Clock>,

    /// Extension field handling.
    extensions: ExtensionExtractor,
}

impl LeaseManager {
    /// Create a lease manager.
    ///
    /// `store` and `mirror_store` must enforce expiry against the same clock
    /// passed here.
    pub fn new(
        config: RegistryConfig,
        store: Arc<dyn DocumentStore>,
        mirror_store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mirror = WashoutMirror::new(mirror_store, config.washout_period());
        let extensions = ExtensionExtractor::new(config.legacy_keys.clone());
        Self {
            config,
            store,
            mirror,
            clock,
            extensions,
        }
    }

    /// Get the registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Get the washout mirror.
    pub fn mirror(&self) -> &WashoutMirror {
        &self.mirror
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register or re-register a resource.
    ///
    /// Fails with `Conflict` if the key holds a different kind, with
    /// `MissingParent` if the owning resource is not registered as the kind
    /// the body claims, with `InvalidRequest` if an extension field would
    /// overwrite registry metadata, and with
    /// `PartialWriteFailure` if the metadata could not be written, in which
    /// case the record has been removed again.
    pub async fn register(
        &self,
        kind: ResourceKind,
        key: &str,
        body: Value,
    ) -> RegistryResult<Registration> {
        let mut body = match body {
            Value::Object(map) => map,
            other => {
                return Err(RegistryError::invalid(format!(
                    "{} body must be a JSON object, got {}",
                    kind,
                    json_type(&other)
                )))
            }
        };

        let prior = self.prior_registration(kind, key).await?;
        let extensions = admissible_extensions(kind, key, self.extensions.extract(&mut body))?;
        let node_id = HierarchyResolver::new(self.store.as_ref())
            .resolve(kind, key, &body)
            .await?;

        let now = self.clock.now();
        let expires_at = self.lease_deadline(kind, key, &node_id, now).await?;
        let prior = self
            .write_body(kind, key, body.clone(), expires_at, prior)
            .await?;

        let created = matches!(prior, Prior::Absent);
        let created_at = match prior {
            Prior::Registered {
                created_at: Some(created_at),
            } => created_at,
            _ => Value::from(now.nanos),
        };
        let last_updated = Value::from(now.nanos);

        MetadataSaga::new(self.store.as_ref(), key)
            .step(fields::CREATED_AT, created_at.clone())
            .step(fields::LAST_UPDATED, last_updated.clone())
            .step(fields::RESOURCE_TYPE, kind.as_str())
            .step(fields::NODE_ID, node_id.as_str())
            .steps(extensions.clone())
            .run()
            .await?;

        let mut metadata = extensions;
        metadata.insert(fields::CREATED_AT.to_string(), created_at);
        metadata.insert(fields::LAST_UPDATED.to_string(), last_updated);
        metadata.insert(fields::RESOURCE_TYPE.to_string(), kind.as_str().into());
        metadata.insert(fields::NODE_ID.to_string(), node_id.as_str().into());
        if let Err(e) = self
            .mirror
            .record(key, body.clone(), metadata, expires_at)
            .await
        {
            log_mirror_failure(&e);
        }

        tracing::info!(
            kind = %kind,
            key,
            node_id = %node_id,
            expires_at = %expires_at,
            created,
            "registered resource"
        );

        Ok(Registration {
            kind,
            key: key.to_string(),
            body,
            node_id,
            created,
            expires_at,
        })
    }

    /// Check the key for an existing registration of a different kind.
    async fn prior_registration(&self, kind: ResourceKind, key: &str) -> RegistryResult<Prior> {
        let existing = match self
            .store
            .get_metadata_field(key, fields::RESOURCE_TYPE)
            .await
        {
            Ok(existing) => existing,
            Err(e) if e.is_absent() => return Ok(Prior::Absent),
            Err(e) => return Err(e.into()),
        };

        if existing.as_str() != Some(kind.as_str()) {
            return Err(RegistryError::Conflict {
                key: key.to_string(),
                existing: existing
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| existing.to_string()),
                requested: kind,
            });
        }

        let created_at = match self.store.get_metadata_field(key, fields::CREATED_AT).await {
            Ok(created_at) => Some(created_at),
            Err(e) if e.is_absent() => None,
            Err(e) => return Err(e.into()),
        };
        Ok(Prior::Registered { created_at })
    }

    /// Expiry deadline for a new registration.
    async fn lease_deadline(
        &self,
        kind: ResourceKind,
        key: &str,
        node_id: &str,
        now: Timestamp,
    ) -> RegistryResult<Timestamp> {
        let full = now.add(self.config.default_ttl());
        if kind.is_root() {
            return Ok(full);
        }

        let missing = || RegistryError::MissingParent {
            kind,
            key: key.to_string(),
            parent_kind: ResourceKind::Node,
            parent: node_id.to_string(),
        };
        if !registered_as(self.store.as_ref(), node_id, ResourceKind::Node).await? {
            return Err(missing());
        }
        match self.store.get_expiry(node_id).await {
            Ok(node_expiry) => Ok(full.min(node_expiry)),
            Err(e) if e.is_absent() => Err(missing()),
            Err(e) => Err(e.into()),
        }
    }

    /// Store the body, creating the record or replacing a same-kind one.
    async fn write_body(
        &self,
        kind: ResourceKind,
        key: &str,
        body: Body,
        expires_at: Timestamp,
        prior: Prior,
    ) -> RegistryResult<Prior> {
        if let Prior::Registered { .. } = prior {
            self.store.upsert(key, body, expires_at).await?;
            return Ok(prior);
        }

        match self.store.create(key, body.clone(), expires_at).await {
            Ok(()) => Ok(Prior::Absent),
            Err(StoreError::KeyExists) => {
                // Another writer created the key since it was checked.
                match self.prior_registration(kind, key).await? {
                    Prior::Absent => Err(RegistryError::Conflict {
                        key: key.to_string(),
                        existing: "pending registration".to_string(),
                        requested: kind,
                    }),
                    prior => {
                        self.store.upsert(key, body, expires_at).await?;
                        Ok(prior)
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    // ========================================================================
    // Heartbeat
    // ========================================================================

    /// Extend a node's lease and give its whole subtree the same deadline.
    ///
    /// Returns the new deadline. Descendants deleted while the cascade runs
    /// are skipped.
    pub async fn heartbeat(&self, node_key: &str) -> RegistryResult<Timestamp> {
        self.ensure_kind(ResourceKind::Node, node_key).await?;

        let expires_at = self.clock.now().add(self.config.default_ttl());
        self.store
            .touch(node_key, expires_at)
            .await
            .map_err(|e| absent_as_not_found(node_key, e))?;

        let descendants = DescendantQuery::new(self.store.as_ref())
            .find(ResourceKind::Node, node_key)
            .await?;
        let mut extended = Vec::with_capacity(descendants.len());
        for key in descendants {
            match self.store.touch(&key, expires_at).await {
                Ok(()) => extended.push(key),
                Err(StoreError::NotFound) => {
                    tracing::debug!(key = %key, node_id = node_key, "descendant gone before heartbeat touch")
                }
                Err(e) => return Err(e.into()),
            }
        }

        for key in std::iter::once(node_key).chain(extended.iter().map(String::as_str)) {
            if let Err(e) = self.mirror.extend(key, expires_at).await {
                log_mirror_failure(&e);
            }
        }

        tracing::debug!(
            node_id = node_key,
            descendants = extended.len(),
            expires_at = %expires_at,
            "heartbeat"
        );
        Ok(expires_at)
    }

    /// Current lease deadline of a node, without extending it.
    pub async fn lease(&self, node_key: &str) -> RegistryResult<Timestamp> {
        self.ensure_kind(ResourceKind::Node, node_key).await?;
        self.store
            .get_expiry(node_key)
            .await
            .map_err(|e| absent_as_not_found(node_key, e))
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Delete a resource and everything it owns.
    ///
    /// A node takes its whole subtree with it. Below the node level the
    /// cascade follows body references transitively, so deleting a device
    /// also reaches flows that name only one of its sources. Every removed
    /// record is tombstoned in the washout mirror.
    pub async fn delete(&self, kind: ResourceKind, key: &str) -> RegistryResult<Deletion> {
        self.ensure_kind(kind, key).await?;

        let targets = self.deletion_targets(kind, key).await?;
        let now = self.clock.now();
        let mut removed = Vec::with_capacity(targets.len());
        for target in targets {
            match self.store.remove(&target).await {
                Ok(()) => {
                    self.tombstone(&target, now).await;
                    removed.push(target);
                }
                Err(StoreError::NotFound) => {
                    tracing::debug!(key = %target, "descendant already gone")
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.store
            .remove(key)
            .await
            .map_err(|e| absent_as_not_found(key, e))?;
        self.tombstone(key, now).await;

        tracing::info!(kind = %kind, key, descendants = removed.len(), "deleted resource");
        Ok(Deletion {
            key: key.to_string(),
            removed,
        })
    }

    /// Everything a deletion of `kind`/`key` must remove, excluding `key`.
    async fn deletion_targets(&self, kind: ResourceKind, key: &str) -> RegistryResult<Vec<String>> {
        let query = DescendantQuery::new(self.store.as_ref());
        if kind.is_root() {
            return Ok(query.find(kind, key).await?);
        }

        let mut targets = BTreeSet::new();
        let mut pending = VecDeque::from([(kind, key.to_string())]);
        while let Some((parent_kind, parent)) = pending.pop_front() {
            for child in query.find(parent_kind, &parent).await? {
                if child == key || !targets.insert(child.clone()) {
                    continue;
                }
                if let Some(child_kind) = self.kind_of(&child).await? {
                    pending.push_back((child_kind, child));
                }
            }
        }
        Ok(targets.into_iter().collect())
    }

    async fn tombstone(&self, key: &str, now: Timestamp) {
        if let Err(e) = self.mirror.tombstone(key, now).await {
            log_mirror_failure(&e);
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Body of a registered resource.
    pub async fn get(&self, kind: ResourceKind, key: &str) -> RegistryResult<Body> {
        self.ensure_kind(kind, key).await?;
        self.store
            .get_body(key)
            .await
            .map_err(|e| absent_as_not_found(key, e))
    }

    /// Body, metadata and expiry of a registered resource.
    pub async fn get_record(&self, kind: ResourceKind, key: &str) -> RegistryResult<ResourceRecord> {
        self.ensure_kind(kind, key).await?;
        let not_found = |e: StoreError| absent_as_not_found(key, e);
        let body = self.store.get_body(key).await.map_err(not_found)?;
        let metadata = self.store.get_metadata(key).await.map_err(not_found)?;
        let expires_at = self.store.get_expiry(key).await.map_err(not_found)?;
        Ok(ResourceRecord {
            kind,
            body,
            metadata,
            expires_at,
        })
    }

    /// Check if `key` is registered as `kind`.
    pub async fn resource_exists(&self, kind: ResourceKind, key: &str) -> RegistryResult<bool> {
        match self.ensure_kind(kind, key).await {
            Ok(()) => Ok(true),
            Err(RegistryError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Keys of every resource owned by a node.
    pub async fn node_residents(&self, node_key: &str) -> RegistryResult<Vec<String>> {
        self.ensure_kind(ResourceKind::Node, node_key).await?;
        Ok(DescendantQuery::new(self.store.as_ref())
            .find(ResourceKind::Node, node_key)
            .await?)
    }

    /// Keys found by the descendant query for `kind`/`key`.
    ///
    /// Whole subtree for a node, direct references otherwise.
    pub async fn descendants(&self, kind: ResourceKind, key: &str) -> RegistryResult<Vec<String>> {
        Ok(DescendantQuery::new(self.store.as_ref())
            .find(kind, key)
            .await?)
    }

    /// Last accepted state of a resource from the washout mirror.
    ///
    /// Still answers after the primary record expired or was deleted, until
    /// the washout period lapses.
    pub async fn get_washout(&self, kind: ResourceKind, key: &str) -> RegistryResult<WashoutRecord> {
        let record = self.mirror.get(key).await?;
        let recorded_kind = record
            .metadata
            .get(fields::RESOURCE_TYPE)
            .and_then(Value::as_str);
        if recorded_kind != Some(kind.as_str()) {
            return Err(RegistryError::not_found(key));
        }
        Ok(record)
    }

    /// Fail with NotFound unless `key` is registered as `kind`.
    async fn ensure_kind(&self, kind: ResourceKind, key: &str) -> RegistryResult<()> {
        match self
            .store
            .get_metadata_field(key, fields::RESOURCE_TYPE)
            .await
        {
            Ok(existing) if existing.as_str() == Some(kind.as_str()) => Ok(()),
            Ok(_) => Err(RegistryError::not_found(key)),
            Err(e) => Err(absent_as_not_found(key, e)),
        }
    }

    /// Registered kind of `key`, or None if it is gone or not yet typed.
    async fn kind_of(&self, key: &str) -> RegistryResult<Option<ResourceKind>> {
        match self.store.get_metadata_field(key, fields::RESOURCE_TYPE).await {
            Ok(v) => Ok(v.as_str().and_then(ResourceKind::from_path_segment)),
            Err(e) if e.is_absent() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reject extension fields that would overwrite a registry-owned field.
fn admissible_extensions(
    kind: ResourceKind,
    key: &str,
    extensions: ExtensionFields,
) -> RegistryResult<Metadata> {
    let admitted = extensions.into_metadata();
    if let Some(name) = admitted
        .keys()
        .find(|name| fields::RESERVED.contains(&name.as_str()))
    {
        return Err(RegistryError::invalid(format!(
            "{} {} carries extension field {}{} which shadows registry metadata",
            kind, key, EXTENSION_MARKER, name
        )));
    }
    Ok(admitted)
}

fn absent_as_not_found(key: &str, e: StoreError) -> RegistryError {
    if e.is_absent() {
        RegistryError::not_found(key)
    } else {
        e.into()
    }
}

fn log_mirror_failure(e: &RegistryError) {
    tracing::warn!(error = %e, "washout mirror write failed");
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
