//! Compensated metadata write sequence.
//!
//! A registration stores its body first and then writes each metadata field
//! as a separate store mutation. The store offers no way to make those writes
//! atomic, so they run as an ordered list of steps: the first failing step
//! abandons the rest and removes the body written before the sequence
//! started. A body without metadata is invisible to every query and would
//! otherwise linger until its TTL lapsed.

use crate::core::error::{RegistryError, RegistryResult, StoreError};
use crate::store::{DocumentStore, Metadata};
use serde_json::Value;

/// Ordered metadata writes against one key, rolled back as a unit.
pub struct MetadataSaga<'a> {
    store: &'a dyn DocumentStore,
    key: &'a str,
    steps: Vec<(String, Value)>,
}

impl<'a> MetadataSaga<'a> {
    /// Start a sequence for a key whose body has already been stored.
    pub fn new(store: &'a dyn DocumentStore, key: &'a str) -> Self {
        Self {
            store,
            key,
            steps: Vec::new(),
        }
    }

    /// Append a field write.
    pub fn step(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.steps.push((field.into(), value.into()));
        self
    }

    /// Append one write per entry of `fields`.
    pub fn steps(mut self, fields: Metadata) -> Self {
        self.steps.extend(fields);
        self
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Check if no writes are queued.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order.
    ///
    /// On the first failure the body is removed and
    /// [`RegistryError::PartialWriteFailure`] names the failing field.
    pub async fn run(self) -> RegistryResult<()> {
        for (field, value) in self.steps {
            let update = Metadata::from([(field.clone(), value)]);
            if let Err(source) = self.store.mutate_metadata(self.key, update).await {
                compensate(self.store, self.key).await;
                return Err(RegistryError::PartialWriteFailure {
                    key: self.key.to_string(),
                    field,
                    source,
                });
            }
        }
        Ok(())
    }
}

/// Best-effort removal of the body written before the sequence.
async fn compensate(store: &dyn DocumentStore, key: &str) {
    match store.remove(key).await {
        Ok(()) => tracing::debug!(key, "rolled back partially registered resource"),
        // Already gone: expired or deleted concurrently.
        Err(StoreError::NotFound) => {}
        Err(e) => tracing::warn!(
            key,
            error = %e,
            "failed to roll back partially registered resource; it will linger until its TTL lapses"
        ),
    }
}
