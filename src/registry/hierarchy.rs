//! Hierarchy resolution.
//!
//! Every resource caches the id of the node at the root of its tree in its
//! `node_id` metadata field. The resolver computes that id for a candidate
//! resource before it is admitted, reading the cached value of an already
//! registered ancestor instead of walking the whole chain. Every ancestor
//! consulted must be registered as the kind the body claims:
//!
//! ```text
//! node      node_id = own key
//! device    node_id = body.node_id
//! source    node_id = meta(body.device_id).node_id
//! sender    node_id = meta(body.device_id).node_id
//! receiver  node_id = meta(body.device_id).node_id
//! flow      node_id = meta(body.device_id).node_id
//!           or, without device_id:
//!           node_id = meta(body(body.source_id).device_id).node_id
//! ```

use super::fields;
use super::kind::ResourceKind;
use crate::core::error::{RegistryError, RegistryResult};
use crate::store::{Body, DocumentStore};

/// Computes the owning node of a resource.
pub struct HierarchyResolver<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> HierarchyResolver<'a> {
    /// Create a resolver reading from the given store.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Resolve the `node_id` of the resource `kind`/`key` with the given body.
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        key: &str,
        body: &Body,
    ) -> RegistryResult<String> {
        match kind {
            ResourceKind::Node => Ok(key.to_string()),
            ResourceKind::Device => {
                required_field(body, kind, fields::NODE_ID).map(str::to_string)
            }
            ResourceKind::Source | ResourceKind::Sender | ResourceKind::Receiver => {
                let device_id =
                    required_field(body, kind, ResourceKind::Device.reference_field())?;
                self.node_of_device(kind, key, device_id).await
            }
            ResourceKind::Flow => {
                if let Some(device_id) = string_field(body, ResourceKind::Device.reference_field()) {
                    return self.node_of_device(kind, key, device_id).await;
                }
                let source_id = string_field(body, ResourceKind::Source.reference_field())
                    .ok_or_else(|| {
                        RegistryError::invalid(format!(
                            "flow {} names neither device_id nor source_id",
                            key
                        ))
                    })?;
                let device_id = self.device_of_source(key, source_id).await?;
                self.node_of_device(kind, key, &device_id).await
            }
        }
    }

    /// Cached `node_id` of a registered device.
    async fn node_of_device(
        &self,
        kind: ResourceKind,
        key: &str,
        device_id: &str,
    ) -> RegistryResult<String> {
        let missing = || RegistryError::MissingParent {
            kind,
            key: key.to_string(),
            parent_kind: ResourceKind::Device,
            parent: device_id.to_string(),
        };

        if !registered_as(self.store, device_id, ResourceKind::Device).await? {
            return Err(missing());
        }
        match self.store.get_metadata_field(device_id, fields::NODE_ID).await {
            Ok(value) => value.as_str().map(str::to_string).ok_or_else(missing),
            Err(e) if e.is_absent() => Err(missing()),
            Err(e) => Err(e.into()),
        }
    }

    /// Device declared in a registered source's body.
    async fn device_of_source(&self, flow_key: &str, source_id: &str) -> RegistryResult<String> {
        let missing = || RegistryError::MissingParent {
            kind: ResourceKind::Flow,
            key: flow_key.to_string(),
            parent_kind: ResourceKind::Source,
            parent: source_id.to_string(),
        };

        if !registered_as(self.store, source_id, ResourceKind::Source).await? {
            return Err(missing());
        }
        match self.store.get_body(source_id).await {
            Ok(source) => string_field(&source, ResourceKind::Device.reference_field())
                .map(str::to_string)
                .ok_or_else(missing),
            Err(e) if e.is_absent() => Err(missing()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Check if `key` is registered as `kind`.
///
/// A record of another kind, or one whose type is not yet written, counts
/// as absent.
pub(crate) async fn registered_as(
    store: &dyn DocumentStore,
    key: &str,
    kind: ResourceKind,
) -> RegistryResult<bool> {
    match store.get_metadata_field(key, fields::RESOURCE_TYPE).await {
        Ok(existing) => Ok(existing.as_str() == Some(kind.as_str())),
        Err(e) if e.is_absent() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

fn string_field<'b>(body: &'b Body, field: &str) -> Option<&'b str> {
    body.get(field).and_then(|v| v.as_str()).filter(|s| !s.is_empty())
}

fn required_field<'b>(
    body: &'b Body,
    kind: ResourceKind,
    field: &str,
) -> RegistryResult<&'b str> {
    string_field(body, field)
        .ok_or_else(|| RegistryError::invalid(format!("{} body is missing {}", kind, field)))
}
