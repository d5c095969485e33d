//! Common test utilities.
//!
//! This module contains shared helpers for integration tests.
//! Import with `mod common;` in test files.

#![allow(dead_code)]

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use trellis::core::config::RegistryConfig;
use trellis::core::error::{StoreError, StoreResult};
use trellis::core::time::{ManualClock, Timestamp};
use trellis::registry::LeaseManager;
use trellis::store::{Body, DocumentStore, MemoryStore, Metadata, QueryField, StoreFuture};

/// Registry start time used by every fixture.
pub const START: Timestamp = Timestamp::from_millis(1_000_000);

/// Default lease length in the test configuration.
pub const TTL: Duration = Duration::from_millis(12_000);

/// Washout period in the test configuration.
pub const WASHOUT: Duration = Duration::from_millis(30_000);

/// Create a configuration file with the given contents.
pub fn create_config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

/// Create a minimal valid configuration file.
pub fn create_minimal_config() -> NamedTempFile {
    create_config_file(
        r#"
[registry]
default_ttl_ms = 12000
washout_period_ms = 30000
"#,
    )
}

/// Registry configuration used by [`TestRegistry`].
pub fn registry_config() -> RegistryConfig {
    RegistryConfig {
        default_ttl_ms: TTL.as_millis() as u64,
        washout_period_ms: WASHOUT.as_millis() as u64,
        ..RegistryConfig::default()
    }
}

/// A lease manager on a manual clock with direct access to its stores.
pub struct TestRegistry {
    pub clock: Arc<ManualClock>,
    pub primary: Arc<MemoryStore>,
    pub washout: Arc<MemoryStore>,
    pub manager: LeaseManager,
}

impl TestRegistry {
    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.clock.advance(duration);
    }

    /// Current test time.
    pub fn now(&self) -> Timestamp {
        use trellis::core::time::Clock;
        self.clock.now()
    }
}

/// Build a registry over in-memory stores.
pub fn build_registry() -> TestRegistry {
    let clock = Arc::new(ManualClock::new(START));
    let primary = Arc::new(MemoryStore::new(clock.clone()));
    let washout = Arc::new(MemoryStore::new(clock.clone()));
    let manager = LeaseManager::new(
        registry_config(),
        primary.clone(),
        washout.clone(),
        clock.clone(),
    );
    TestRegistry {
        clock,
        primary,
        washout,
        manager,
    }
}

/// Build a registry whose primary store is wrapped in a [`FaultyStore`].
pub fn build_faulty_registry() -> (TestRegistry, Arc<FaultyStore>) {
    let clock = Arc::new(ManualClock::new(START));
    let primary = Arc::new(MemoryStore::new(clock.clone()));
    let washout = Arc::new(MemoryStore::new(clock.clone()));
    let faulty = Arc::new(FaultyStore::new(primary.clone()));
    let manager = LeaseManager::new(
        registry_config(),
        faulty.clone(),
        washout.clone(),
        clock.clone(),
    );
    (
        TestRegistry {
            clock,
            primary,
            washout,
            manager,
        },
        faulty,
    )
}

// ============================================================================
// Resource bodies
// ============================================================================

pub fn node_body(id: &str) -> Value {
    json!({ "id": id, "label": format!("node {}", id), "version": "1:0" })
}

pub fn device_body(id: &str, node_id: &str) -> Value {
    json!({ "id": id, "node_id": node_id, "type": "urn:x-nmos:device:generic" })
}

pub fn source_body(id: &str, device_id: &str) -> Value {
    json!({ "id": id, "device_id": device_id, "format": "urn:x-nmos:format:video" })
}

/// Flow naming its device directly.
pub fn flow_body(id: &str, device_id: &str, source_id: &str) -> Value {
    json!({ "id": id, "device_id": device_id, "source_id": source_id })
}

/// Flow naming only its source.
pub fn source_only_flow_body(id: &str, source_id: &str) -> Value {
    json!({ "id": id, "source_id": source_id })
}

pub fn sender_body(id: &str, device_id: &str, flow_id: &str) -> Value {
    json!({ "id": id, "device_id": device_id, "flow_id": flow_id })
}

pub fn receiver_body(id: &str, device_id: &str) -> Value {
    json!({ "id": id, "device_id": device_id, "subscription": { "sender_id": null } })
}

// ============================================================================
// Fault injection
// ============================================================================

/// Store wrapper that fails selected operations or races them with deletion.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    /// Metadata field whose write fails.
    fail_metadata_field: Mutex<Option<String>>,
    /// Metadata field whose single-field read fails.
    fail_read_field: Mutex<Option<String>>,
    /// Fail every `remove`.
    fail_remove: Mutex<bool>,
    /// Keys deleted by a concurrent writer just before the next `touch` or `remove`.
    vanishing: Mutex<HashSet<String>>,
    /// Count of `remove` calls seen.
    removes: AtomicUsize,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_metadata_field: Mutex::new(None),
            fail_read_field: Mutex::new(None),
            fail_remove: Mutex::new(false),
            vanishing: Mutex::new(HashSet::new()),
            removes: AtomicUsize::new(0),
        }
    }

    /// Fail any metadata mutation that writes `field`.
    pub fn fail_metadata_write(&self, field: &str) {
        *self.fail_metadata_field.lock() = Some(field.to_string());
    }

    /// Fail any single-field read of `field`.
    pub fn fail_metadata_read(&self, field: &str) {
        *self.fail_read_field.lock() = Some(field.to_string());
    }

    /// Fail every `remove` call.
    pub fn fail_removes(&self) {
        *self.fail_remove.lock() = true;
    }

    /// Delete `key` behind the registry's back when it next touches or removes it.
    pub fn vanish_before_write(&self, key: &str) {
        self.vanishing.lock().insert(key.to_string());
    }

    /// If `key` is marked, delete it from the inner store and report it gone.
    fn vanished<'a, T: Send + 'a>(&'a self, key: &str) -> Option<StoreFuture<'a, T>> {
        if !self.vanishing.lock().remove(key) {
            return None;
        }
        let key = key.to_string();
        let gone: StoreFuture<'a, T> = Box::pin(async move {
            let _ = self.inner.remove(&key).await;
            Err::<T, _>(StoreError::NotFound)
        });
        Some(gone)
    }

    /// Stop injecting faults.
    pub fn heal(&self) {
        *self.fail_metadata_field.lock() = None;
        *self.fail_read_field.lock() = None;
        *self.fail_remove.lock() = false;
        self.vanishing.lock().clear();
    }

    pub fn remove_calls(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }
}

fn failed<'a, T: Send + 'a>() -> StoreFuture<'a, T> {
    Box::pin(async { Err::<T, _>(StoreError::unavailable("injected fault")) })
}

impl DocumentStore for FaultyStore {
    fn create(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        self.inner.create(key, body, expires_at)
    }

    fn upsert(&self, key: &str, body: Body, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        self.inner.upsert(key, body, expires_at)
    }

    fn mutate_metadata(&self, key: &str, updates: Metadata) -> StoreFuture<'_, ()> {
        let fail = self
            .fail_metadata_field
            .lock()
            .as_ref()
            .is_some_and(|field| updates.contains_key(field));
        if fail {
            return failed();
        }
        self.inner.mutate_metadata(key, updates)
    }

    fn get_metadata_field(&self, key: &str, field: &str) -> StoreFuture<'_, Value> {
        if self.fail_read_field.lock().as_deref() == Some(field) {
            return failed();
        }
        self.inner.get_metadata_field(key, field)
    }

    fn get_metadata(&self, key: &str) -> StoreFuture<'_, Metadata> {
        self.inner.get_metadata(key)
    }

    fn get_body(&self, key: &str) -> StoreFuture<'_, Body> {
        self.inner.get_body(key)
    }

    fn get_expiry(&self, key: &str) -> StoreFuture<'_, Timestamp> {
        self.inner.get_expiry(key)
    }

    fn touch(&self, key: &str, expires_at: Timestamp) -> StoreFuture<'_, ()> {
        if let Some(gone) = self.vanished(key) {
            return gone;
        }
        self.inner.touch(key, expires_at)
    }

    fn remove(&self, key: &str) -> StoreFuture<'_, ()> {
        self.removes.fetch_add(1, Ordering::SeqCst);
        if *self.fail_remove.lock() {
            return failed();
        }
        if let Some(gone) = self.vanished(key) {
            return gone;
        }
        self.inner.remove(key)
    }

    fn query_equals(&self, field: QueryField, value: &str) -> StoreFuture<'_, Vec<String>> {
        self.inner.query_equals(field, value)
    }
}

/// Unwrap a store result in tests, naming the operation on failure.
pub fn ok<T>(op: &str, result: StoreResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => panic!("{} failed: {}", op, e),
    }
}
