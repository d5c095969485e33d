//! Backing document store contract.
//!
//! The registry consumes a key-value document store that offers per-key
//! atomicity, a metadata side-channel stored independently of each body,
//! store-enforced expiry, and equality lookups. There is no multi-key
//! transaction primitive; every method below touches exactly one key, apart
//! from [`DocumentStore::query_equals`], which is a read-only secondary
//! lookup that may briefly lag behind writes.
//!
//! - [`memory`] - In-process backend with store-enforced expiry

pub mod memory;

pub use memory::MemoryStore;

use crate::core::error::StoreResult;
use crate::core::time::Timestamp;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// A resource body: a JSON object.
pub type Body = serde_json::Map<String, Value>;

/// Metadata sidecar fields.
pub type Metadata = BTreeMap<String, Value>;

/// Future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Field targeted by an equality lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryField {
    /// A metadata sidecar field.
    Metadata(String),
    /// A top-level field of the body.
    Body(String),
}

impl QueryField {
    /// Metadata field lookup.
    pub fn metadata(name: impl Into<String>) -> Self {
        Self::Metadata(name.into())
    }

    /// Body field lookup.
    pub fn body(name: impl Into<String>) -> Self {
        Self::Body(name.into())
    }
}

impl std::fmt::Display for QueryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Metadata(name) => write!(f, "meta.{}", name),
            Self::Body(name) => write!(f, "{}", name),
        }
    }
}

/// Per-key document store with a metadata side-channel and expiry.
///
/// Expired records are invisible: every operation on an expired key behaves
/// exactly as if the key had never been written.
pub trait DocumentStore: Send + Sync {
    /// Insert a new record. Fails `KeyExists` if a live record is present.
    fn create(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()>;

    /// Insert or replace a record. A replaced record loses its metadata.
    fn upsert(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()>;

    /// Merge fields into a record's metadata without touching its body.
    fn mutate_metadata(&self, key: &str, updates: Metadata) -> StoreFuture<'_, ()>;

    /// Read one metadata field.
    fn get_metadata_field(&self, key: &str, field: &str) -> StoreFuture<'_, Value>;

    /// Read the whole metadata sidecar.
    fn get_metadata(&self, key: &str) -> StoreFuture<'_, Metadata>;

    /// Read a record's body.
    fn get_body(&self, key: &str) -> StoreFuture<'_, Body>;

    /// Read a record's absolute expiry deadline.
    fn get_expiry(&self, key: &str) -> StoreFuture<'_, Timestamp>;

    /// Move a record's expiry deadline without rewriting body or metadata.
    fn touch(&self, key: &str, expires_at: Timestamp) -> StoreFuture<'_, ()>;

    /// Delete a record.
    fn remove(&self, key: &str) -> StoreFuture<'_, ()>;

    /// Keys of live records whose field equals `value`, in no particular order.
    fn query_equals(&self, field: QueryField, value: &str) -> StoreFuture<'_, Vec<String>>;
}
