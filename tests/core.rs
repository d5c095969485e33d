//! Core infrastructure tests.

mod common;

use std::time::Duration;
use trellis::core::config::{Config, ConfigOverrides};
use trellis::core::error::{HttpErrorMapping, RegistryError, StoreError};
use trellis::core::time::Timestamp;
use trellis::registry::ResourceKind;

// ============================================================================
// Config tests
// ============================================================================

#[test]
fn parse_minimal_config() {
    let file = common::create_minimal_config();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.registry.default_ttl(), Duration::from_secs(12));
    assert_eq!(config.registry.washout_period(), Duration::from_secs(30));
    assert_eq!(config.store.backend, "memory");
    assert_eq!(config.telemetry.log_level, "info");
}

#[test]
fn empty_config_uses_defaults() {
    let config = Config::from_toml("").unwrap();
    assert_eq!(config.registry.default_ttl_ms, 12_000);
    assert_eq!(config.registry.washout_period_ms, 30_000);
    assert_eq!(config.store.sweep_period_ms, 1_000);
    assert_eq!(
        config.registry.legacy_keys.get("@_apiversion").map(String::as_str),
        Some("api_version")
    );
}

#[test]
fn parse_full_config() {
    let file = common::create_config_file(
        r#"
[registry]
default_ttl_ms = 6000
washout_period_ms = 60000

[registry.legacy_keys]
"@_apiversion" = "api_version"
"@_ver" = "version"

[store]
backend = "memory"
sweep_period_ms = 250

[telemetry]
log_level = "debug"
"#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.registry.default_ttl_ms, 6_000);
    assert_eq!(config.registry.legacy_keys.len(), 2);
    assert_eq!(config.registry.legacy_keys["@_ver"], "version");
    assert_eq!(config.store.sweep_period_ms, 250);
    assert_eq!(config.telemetry.log_level, "debug");
}

#[test]
fn validate_zero_ttl() {
    let result = Config::from_toml("[registry]\ndefault_ttl_ms = 0\n");
    assert!(result.unwrap_err().to_string().contains("default_ttl_ms"));
}

#[test]
fn validate_zero_washout() {
    let result = Config::from_toml("[registry]\nwashout_period_ms = 0\n");
    assert!(result.unwrap_err().to_string().contains("washout_period_ms"));
}

#[test]
fn validate_unmarked_legacy_key() {
    let result = Config::from_toml("[registry.legacy_keys]\napiversion = \"api_version\"\n");
    assert!(result.unwrap_err().to_string().contains("legacy_keys"));
}

#[test]
fn validate_unknown_backend() {
    let result = Config::from_toml("[store]\nbackend = \"couchbase\"\n");
    assert!(result.unwrap_err().to_string().contains("backend"));
}

#[test]
fn validate_log_level() {
    let result = Config::from_toml("[telemetry]\nlog_level = \"verbose\"\n");
    assert!(result.unwrap_err().to_string().contains("log_level"));
}

#[test]
fn missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let result = Config::from_file(&dir.path().join("absent.toml"));
    assert!(result.unwrap_err().to_string().contains("failed to read"));
}

#[test]
fn overrides_replace_file_values() {
    let mut config = Config::default();
    config.apply_overrides(&ConfigOverrides {
        log_level: Some("trace".to_string()),
        default_ttl_ms: Some(3_000),
        washout_period_ms: None,
    });

    assert_eq!(config.telemetry.log_level, "trace");
    assert_eq!(config.registry.default_ttl_ms, 3_000);
    assert_eq!(config.registry.washout_period_ms, 30_000);
    config.validate().unwrap();
}

#[test]
fn config_round_trips_through_toml() {
    let mut config = Config::default();
    config.registry.washout_period_ms = 45_000;

    let rendered = config.to_toml().unwrap();
    let parsed = Config::from_toml(&rendered).unwrap();
    assert_eq!(parsed.registry.washout_period_ms, 45_000);
    assert_eq!(parsed.registry.legacy_keys, config.registry.legacy_keys);
}

// ============================================================================
// Error mapping tests
// ============================================================================

#[test]
fn http_status_mapping() {
    let cases = [
        (
            RegistryError::Conflict {
                key: "k".to_string(),
                existing: "node".to_string(),
                requested: ResourceKind::Device,
            },
            409,
        ),
        (
            RegistryError::MissingParent {
                kind: ResourceKind::Device,
                key: "k".to_string(),
                parent_kind: ResourceKind::Node,
                parent: "n".to_string(),
            },
            400,
        ),
        (RegistryError::invalid("bad body"), 400),
        (RegistryError::not_found("k"), 404),
        (
            RegistryError::PartialWriteFailure {
                key: "k".to_string(),
                field: "node_id".to_string(),
                source: StoreError::unavailable("down"),
            },
            500,
        ),
        (RegistryError::Store(StoreError::unavailable("down")), 503),
        (RegistryError::Store(StoreError::KeyExists), 500),
    ];

    for (error, status) in cases {
        assert_eq!(HttpErrorMapping::to_status(&error), status, "{}", error);
    }
}

#[test]
fn error_messages_name_the_resource() {
    let err = RegistryError::MissingParent {
        kind: ResourceKind::Source,
        key: "src-a".to_string(),
        parent_kind: ResourceKind::Device,
        parent: "dev-x".to_string(),
    };
    assert_eq!(err.to_string(), "source src-a references missing device dev-x");
    assert_eq!(
        HttpErrorMapping::to_message(&RegistryError::not_found("node-a")),
        "node-a does not exist in registry"
    );
}

#[test]
fn only_transient_failures_are_retriable() {
    assert!(RegistryError::Store(StoreError::unavailable("down")).is_retriable());
    assert!(!RegistryError::not_found("k").is_retriable());
    assert!(!RegistryError::invalid("bad").is_retriable());
    assert!(StoreError::FieldNotFound {
        field: "x".to_string()
    }
    .is_absent());
    assert!(!StoreError::KeyExists.is_absent());
}

// ============================================================================
// Time tests
// ============================================================================

#[test]
fn timestamp_arithmetic() {
    let t = Timestamp::from_millis(1_500);
    assert_eq!(t.nanos, 1_500_000_000);
    assert_eq!(t.as_millis(), 1_500);
    assert_eq!(t.add(Duration::from_millis(500)), Timestamp::from_millis(2_000));
    assert!(t.is_at_or_after(Timestamp::from_millis(1_500)));
    assert!(!t.is_at_or_after(Timestamp::from_millis(1_501)));
    assert_eq!(Timestamp::from_nanos(u64::MAX).add(Duration::from_secs(1)).nanos, u64::MAX);
}

#[test]
fn timestamp_display() {
    assert_eq!(Timestamp::from_millis(1_500).to_string(), "1:500000000");
    assert_eq!(Timestamp::zero().to_string(), "0:000000000");
}

#[test]
fn timestamp_serializes_as_nanos() {
    let json = serde_json::to_value(Timestamp::from_millis(2)).unwrap();
    assert_eq!(json, serde_json::json!(2_000_000));
}
