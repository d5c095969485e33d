//! Core runtime infrastructure.
//!
//! - [`config`] - Configuration parsing and validation
//! - [`runtime`] - Store wiring and the expiry sweeper
//! - [`time`] - Timestamps and the shared clock
//! - [`error`] - Error types and HTTP status mapping

pub mod config;
pub mod error;
pub mod runtime;
pub mod time;
