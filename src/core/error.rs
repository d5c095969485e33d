//! Error types and API-layer status mapping.
//!
//! Store misses surface as [`StoreError`] values; the Lease Manager turns
//! them into the registry taxonomy of [`RegistryError`], which the API layer
//! maps to response codes through [`HttpErrorMapping`].

use crate::registry::kind::ResourceKind;
use thiserror::Error;

/// Failures reported by a backing document store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// `create` found a live record at the key.
    #[error("key already exists")]
    KeyExists,

    /// No live record at the key (never written, removed, or expired).
    #[error("key not found")]
    NotFound,

    /// The record exists but the requested metadata field is unset.
    #[error("metadata field {field} not found")]
    FieldNotFound { field: String },

    /// The store could not be reached or refused the operation.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    /// Create an Unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// True for misses that mean "there is nothing here".
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::NotFound | Self::FieldNotFound { .. })
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Registry error conditions.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The key is already registered as a different resource type.
    #[error("{key} is registered as a {existing}, not a {requested}")]
    Conflict {
        key: String,
        existing: String,
        requested: ResourceKind,
    },

    /// The owning resource named by the body does not exist.
    #[error("{kind} {key} references missing {parent_kind} {parent}")]
    MissingParent {
        kind: ResourceKind,
        key: String,
        parent_kind: ResourceKind,
        parent: String,
    },

    /// Operation target is absent.
    #[error("{key} not found")]
    NotFound { key: String },

    /// A metadata write failed after the body was stored; the body was rolled back.
    #[error("registration of {key} failed writing metadata field {field}: {source}")]
    PartialWriteFailure {
        key: String,
        field: String,
        #[source]
        source: StoreError,
    },

    /// The washout copy could not be written. Logged, never returned to callers.
    #[error("washout mirror write for {key} failed: {source}")]
    MirrorWriteFailure {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The request body is malformed for its resource kind.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Any other store failure, passed through without retry.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    /// Create a NotFound error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create an InvalidRequest error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Check if the caller may reasonably retry the same request.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::Unavailable { .. }) | Self::PartialWriteFailure { .. }
        )
    }
}

/// Result type using RegistryError.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Maps registry errors onto the status codes the HTTP API layer answers with.
pub struct HttpErrorMapping;

impl HttpErrorMapping {
    /// Status code for an error.
    pub fn to_status(error: &RegistryError) -> u16 {
        match error {
            RegistryError::Conflict { .. } => 409,
            RegistryError::MissingParent { .. } => 400,
            RegistryError::InvalidRequest { .. } => 400,
            RegistryError::NotFound { .. } => 404,
            RegistryError::PartialWriteFailure { .. } => 500,
            RegistryError::MirrorWriteFailure { .. } => 500,
            RegistryError::Store(StoreError::Unavailable { .. }) => 503,
            RegistryError::Store(StoreError::NotFound) => 404,
            RegistryError::Store(_) => 500,
        }
    }

    /// Client-facing error message.
    pub fn to_message(error: &RegistryError) -> String {
        match error {
            RegistryError::Conflict { .. } => "Key already exists".to_string(),
            RegistryError::NotFound { key } => format!("{} does not exist in registry", key),
            _ => error.to_string(),
        }
    }
}
