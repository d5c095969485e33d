//! Washout mirror.
//!
//! A second store keyed identically to the primary keeps the last accepted
//! body and metadata of every resource, with an expiry that trails the
//! primary record's by the washout period. When a resource expires or is
//! deleted it stays readable here until the grace window closes.
//!
//! Mirror writes are advisory: every method reports failures as
//! [`RegistryError::MirrorWriteFailure`] for the caller to log, and the
//! registry never fails an operation because of them.

use super::fields;
use crate::core::error::{RegistryError, RegistryResult, StoreError};
use crate::core::time::Timestamp;
use crate::store::{Body, DocumentStore, Metadata};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Last accepted state of a resource, as held by the mirror.
#[derive(Debug, Clone, PartialEq)]
pub struct WashoutRecord {
    /// Resource body.
    pub body: Body,
    /// Metadata sidecar at the time of the last write.
    pub metadata: Metadata,
    /// When the mirror itself forgets the resource.
    pub expires_at: Timestamp,
}

/// Shadow copy of the registry with a longer lifetime.
pub struct WashoutMirror {
    store: Arc<dyn DocumentStore>,
    period: Duration,
}

impl WashoutMirror {
    /// Create a mirror over `store` with the given grace period.
    pub fn new(store: Arc<dyn DocumentStore>, period: Duration) -> Self {
        Self { store, period }
    }

    /// Grace period added to every primary expiry.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Record an accepted registration.
    pub async fn record(
        &self,
        key: &str,
        body: Body,
        metadata: Metadata,
        primary_expiry: Timestamp,
    ) -> RegistryResult<()> {
        let expires_at = primary_expiry.add(self.period);
        self.store
            .upsert(key, body, expires_at)
            .await
            .map_err(|e| mirror_failure(key, e))?;
        self.store
            .mutate_metadata(key, metadata)
            .await
            .map_err(|e| mirror_failure(key, e))
    }

    /// Follow a lease extension of the primary record.
    pub async fn extend(&self, key: &str, primary_expiry: Timestamp) -> RegistryResult<()> {
        self.store
            .touch(key, primary_expiry.add(self.period))
            .await
            .map_err(|e| mirror_failure(key, e))
    }

    /// Mark a resource as deleted at `now`; it stays readable for one period.
    pub async fn tombstone(&self, key: &str, now: Timestamp) -> RegistryResult<()> {
        let update = Metadata::from([(fields::LAST_UPDATED.to_string(), Value::from(now.nanos))]);
        self.store
            .mutate_metadata(key, update)
            .await
            .map_err(|e| mirror_failure(key, e))?;
        self.store
            .touch(key, now.add(self.period))
            .await
            .map_err(|e| mirror_failure(key, e))
    }

    /// Read the mirrored state of a resource.
    pub async fn get(&self, key: &str) -> RegistryResult<WashoutRecord> {
        let body = self.store.get_body(key).await.map_err(|e| absent(key, e))?;
        let metadata = self.store.get_metadata(key).await.map_err(|e| absent(key, e))?;
        let expires_at = self.store.get_expiry(key).await.map_err(|e| absent(key, e))?;
        Ok(WashoutRecord {
            body,
            metadata,
            expires_at,
        })
    }
}

fn mirror_failure(key: &str, source: StoreError) -> RegistryError {
    RegistryError::MirrorWriteFailure {
        key: key.to_string(),
        source,
    }
}

fn absent(key: &str, e: StoreError) -> RegistryError {
    if e.is_absent() {
        RegistryError::not_found(key)
    } else {
        e.into()
    }
}
