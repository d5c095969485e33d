//! Descendant queries.
//!
//! Because every resource caches its root `node_id`, a single equality
//! lookup on that metadata field returns a node's entire subtree whatever its
//! depth. Below the node level the only link is the reference a child holds
//! in its body (`device_id`, `source_id`, ...), so those lookups return
//! direct references only.

use super::fields;
use super::kind::ResourceKind;
use crate::core::error::StoreResult;
use crate::store::{DocumentStore, QueryField};

/// Finds resources owned by a given resource.
pub struct DescendantQuery<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> DescendantQuery<'a> {
    /// Create a query over the given store.
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Lookup used for resources of `kind`.
    pub fn field_for(kind: ResourceKind) -> QueryField {
        if kind.is_root() {
            QueryField::metadata(fields::NODE_ID)
        } else {
            QueryField::body(kind.reference_field())
        }
    }

    /// Keys owned by `kind`/`key`, excluding `key` itself.
    ///
    /// For a node this is the whole subtree; for any other kind it is the
    /// resources that reference `key` directly.
    pub async fn find(&self, kind: ResourceKind, key: &str) -> StoreResult<Vec<String>> {
        let mut keys = self.store.query_equals(Self::field_for(kind), key).await?;
        // A node caches itself as its own node_id.
        keys.retain(|k| k != key);
        keys.sort();
        Ok(keys)
    }
}
