//! Resource registry and lease management.
//!
//! Turns per-key document storage into a hierarchical, TTL-governed registry:
//! - [`kind`] - Resource kinds
//! - [`extension`] - Extension field extraction and legacy renames
//! - [`hierarchy`] - Owning-node resolution
//! - [`descendants`] - Subtree and direct-reference lookups
//! - [`saga`] - Compensated metadata write sequence
//! - [`washout`] - Grace-window shadow copies
//! - [`lease`] - Registration, heartbeat, deletion and reads
//!
//! # Invariants
//!
//! - Every resource caches the id of its root node in `node_id` metadata,
//!   resolved once at registration.
//! - A non-node resource never outlives its node: its expiry is capped at
//!   the node's when registered and set equal to it by every heartbeat.
//! - A registration that fails part-way leaves no readable record.

pub mod descendants;
pub mod extension;
pub mod hierarchy;
pub mod kind;
pub mod lease;
pub mod saga;
pub mod washout;

pub use kind::ResourceKind;
pub use lease::{Deletion, LeaseManager, Registration, ResourceRecord};
pub use washout::{WashoutMirror, WashoutRecord};

/// Metadata field names written by the registry.
pub mod fields {
    /// Singular kind name of the resource.
    pub const RESOURCE_TYPE: &str = "resource_type";
    /// Root node owning the resource.
    pub const NODE_ID: &str = "node_id";
    /// First registration time, in nanoseconds.
    pub const CREATED_AT: &str = "created_at";
    /// Latest registration or deletion time, in nanoseconds.
    pub const LAST_UPDATED: &str = "last_updated";

    /// Names extension fields may not overwrite.
    pub const RESERVED: [&str; 4] = [RESOURCE_TYPE, NODE_ID, CREATED_AT, LAST_UPDATED];
}
