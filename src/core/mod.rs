//! Core types and configuration for the tempsentry library.
//!
//! This module provides the fundamental building blocks used throughout
//! the library:
//!
//! - [`types`] - Common types like `ThreatLevel`, `ScanRecord`, `ProtectionStats`
//! - [`error`] - Structured error types
//! - [`config`] - The injected protection configuration
//! - [`hasher`] - BLAKE3-based file hashing

pub mod config;
pub mod error;
pub mod hasher;
pub mod types;

// Re-export commonly used types at the core level
pub use config::ProtectionConfig;
pub use error::{ProtectionError, QuarantineError, WatchError};
pub use hasher::FileHasher;
pub use types::{ProtectionEvent, ProtectionStats, ScanRecord, ThreatLevel};
