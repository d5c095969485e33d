//! In-process document store.
//!
//! Records carry an absolute expiry deadline checked against the shared
//! [`Clock`] on every access, so an expired record disappears the moment its
//! deadline passes even if [`MemoryStore::sweep`] has not reclaimed it yet.

use super::{Body, DocumentStore, Metadata, QueryField, StoreFuture};
use crate::core::error::{StoreError, StoreResult};
use crate::core::time::{Clock, Timestamp};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct StoredDocument {
    body: Body,
    metadata: Metadata,
    expires_at: Timestamp,
}

impl StoredDocument {
    fn is_expired_at(&self, now: Timestamp) -> bool {
        now.is_at_or_after(self.expires_at)
    }

    fn field(&self, field: &QueryField) -> Option<&Value> {
        match field {
            QueryField::Metadata(name) => self.metadata.get(name),
            QueryField::Body(name) => self.body.get(name),
        }
    }
}

/// In-memory [`DocumentStore`].
pub struct MemoryStore {
    /// Time source for expiry.
    clock: Arc<dyn Clock>,

    /// Records by key, including expired ones not yet swept.
    data: RwLock<HashMap<String, StoredDocument>>,

    /// Records reclaimed after expiring.
    expired_total: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store driven by the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            data: RwLock::new(HashMap::new()),
            expired_total: AtomicU64::new(0),
        }
    }

    /// Evict every expired record. Returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut data = self.data.write();
        let before = data.len();
        data.retain(|_, doc| !doc.is_expired_at(now));
        let evicted = before - data.len();
        self.expired_total.fetch_add(evicted as u64, Ordering::Relaxed);
        evicted
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.data
            .read()
            .values()
            .filter(|doc| !doc.is_expired_at(now))
            .count()
    }

    /// Check if the store holds no live records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total records reclaimed by expiry since creation.
    pub fn expired_total(&self) -> u64 {
        self.expired_total.load(Ordering::Relaxed)
    }

    /// Run `f` against the live record at `key`.
    fn read_live<T>(
        &self,
        key: &str,
        f: impl FnOnce(&StoredDocument) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let now = self.clock.now();
        let data = self.data.read();
        match data.get(key) {
            Some(doc) if !doc.is_expired_at(now) => f(doc),
            _ => Err(StoreError::NotFound),
        }
    }

    /// Run `f` against the live record at `key` with write access.
    ///
    /// An expired record found on the way is reclaimed first.
    fn write_live<T>(
        &self,
        key: &str,
        f: impl FnOnce(&mut StoredDocument) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let now = self.clock.now();
        let mut data = self.data.write();
        self.reclaim_if_expired(&mut data, key, now);
        match data.get_mut(key) {
            Some(doc) => f(doc),
            None => Err(StoreError::NotFound),
        }
    }

    fn reclaim_if_expired(
        &self,
        data: &mut HashMap<String, StoredDocument>,
        key: &str,
        now: Timestamp,
    ) {
        if data.get(key).is_some_and(|doc| doc.is_expired_at(now)) {
            data.remove(key);
            self.expired_total.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl DocumentStore for MemoryStore {
    fn create(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        let now = self.clock.now();
        let mut data = self.data.write();
        self.reclaim_if_expired(&mut data, key, now);
        let result = if data.contains_key(key) {
            Err(StoreError::KeyExists)
        } else {
            data.insert(
                key.to_string(),
                StoredDocument {
                    body,
                    metadata: Metadata::new(),
                    expires_at,
                },
            );
            Ok(())
        };
        Box::pin(async move { result })
    }

    fn upsert(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        self.data.write().insert(
            key.to_string(),
            StoredDocument {
                body,
                metadata: Metadata::new(),
                expires_at,
            },
        );
        Box::pin(async move { Ok(()) })
    }

    fn mutate_metadata(&self, key: &str, updates: Metadata) -> StoreFuture<'_, ()> {
        let result = self.write_live(key, |doc| {
            doc.metadata.extend(updates);
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn get_metadata_field(&self, key: &str, field: &str) -> StoreFuture<'_, Value> {
        let result = self.read_live(key, |doc| {
            doc.metadata
                .get(field)
                .cloned()
                .ok_or_else(|| StoreError::FieldNotFound {
                    field: field.to_string(),
                })
        });
        Box::pin(async move { result })
    }

    fn get_metadata(&self, key: &str) -> StoreFuture<'_, Metadata> {
        let result = self.read_live(key, |doc| Ok(doc.metadata.clone()));
        Box::pin(async move { result })
    }

    fn get_body(&self, key: &str) -> StoreFuture<'_, Body> {
        let result = self.read_live(key, |doc| Ok(doc.body.clone()));
        Box::pin(async move { result })
    }

    fn get_expiry(&self, key: &str) -> StoreFuture<'_, Timestamp> {
        let result = self.read_live(key, |doc| Ok(doc.expires_at));
        Box::pin(async move { result })
    }

    fn touch(&self, key: &str, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        let result = self.write_live(key, |doc| {
            doc.expires_at = expires_at;
            Ok(())
        });
        Box::pin(async move { result })
    }

    fn remove(&self, key: &str) -> StoreFuture<'_, ()> {
        let now = self.clock.now();
        let mut data = self.data.write();
        self.reclaim_if_expired(&mut data, key, now);
        let result = data.remove(key).map(|_| ()).ok_or(StoreError::NotFound);
        Box::pin(async move { result })
    }

    fn query_equals(&self, field: QueryField, value: &str) -> StoreFuture<'_, Vec<String>> {
        let now = self.clock.now();
        let keys: Vec<String> = self
            .data
            .read()
            .iter()
            .filter(|(_, doc)| !doc.is_expired_at(now))
            .filter(|(_, doc)| doc.field(&field).and_then(Value::as_str) == Some(value))
            .map(|(key, _)| key.clone())
            .collect();
        Box::pin(async move { Ok(keys) })
    }
}
