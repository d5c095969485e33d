//! Trellis - lease-governed registry for broadcast-media resources.
//!
//! Trellis tracks a hierarchy of network resources (nodes, devices, sources,
//! flows, senders and receivers) on top of a key-value document store that
//! offers per-key atomicity, a metadata side-channel and store-enforced
//! expiry. A node keeps itself and everything it owns alive by heartbeating;
//! when it stops, its whole subtree expires together. Deleted or expired
//! resources stay readable from a washout mirror for a grace period.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Registration API layer                       │
//! │        (path parsing, HTTP status via HttpErrorMapping)         │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Lease Manager                            │
//! │   Register │ Heartbeat │ Delete │ Hierarchy │ Metadata saga     │
//! └─────────────────────────────────────────────────────────────────┘
//!                   │                               │
//! ┌───────────────────────────────┐ ┌───────────────────────────────┐
//! │        Primary store          │ │        Washout mirror         │
//! │   body │ metadata │ expiry    │ │   expiry + washout period     │
//! └───────────────────────────────┘ └───────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - Configuration parsing and validation
//! - [`core::runtime`] - Store wiring and the expiry sweeper
//! - [`core::time`] - Timestamps and the shared clock
//! - [`core::error`] - Error types and mapping
//!
//! ## Store
//! - [`store`] - Document store contract
//! - [`store::memory`] - In-memory backend
//!
//! ## Registry
//! - [`registry::lease`] - Registration, heartbeat, deletion and reads
//! - [`registry::hierarchy`] - Owning-node resolution
//! - [`registry::descendants`] - Subtree lookups
//! - [`registry::saga`] - Compensated metadata writes
//! - [`registry::washout`] - Grace-window mirror
//! - [`registry::extension`] - Extension field handling
//!
//! ## CLI
//! - [`cli::commands`] - CLI command implementations

// Core infrastructure
pub mod core;

// Backing store
pub mod store;

// Registry and lease management
pub mod registry;

// CLI
pub mod cli;

// Re-exports for convenience
pub use self::core::{config, error, runtime, time};
pub use registry::{LeaseManager, ResourceKind};
pub use store::{DocumentStore, MemoryStore};
