//! # Tempsentry
//!
//! Realtime protection for download and temp directories: heuristic
//! threat classification, crash-safe quarantine with secure deletion,
//! filesystem watching, and periodic background scanning, coordinated
//! by a single protection session.
//!
//! ## Overview
//!
//! Tempsentry provides the detection and response core of an endpoint
//! protection agent, allowing you to:
//!
//! - Classify files by name heuristics (suspicious extensions, known
//!   offensive tooling, double-extension masquerades)
//! - Watch directories for newly arriving files in real time
//! - Sweep the same directories on a fixed interval as a safety net
//! - Quarantine threats atomically, restore them, or destroy them with
//!   a multi-pass overwrite
//! - Observe everything through broadcast events, statistics snapshots,
//!   and a structured audit trail
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tempsentry::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProtectionConfig::new()
//!         .with_watch_dir("/home/user/Downloads")
//!         .with_auto_clean(true);
//!
//!     let vault = FileVault::open("/var/lib/tempsentry/quarantine")?;
//!     let session = ProtectionSession::new(config, Arc::new(vault));
//!
//!     let mut events = session.subscribe();
//!     session.start().await?;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let ProtectionEvent::ThreatDetected { record, .. } = event {
//!             println!("threat: {} ({})", record.path.display(), record.level);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several layers:
//!
//! - **Core**: Fundamental types, configuration, and error handling
//! - **Classifier**: Pure heuristic rules over file names and metadata
//! - **Watcher**: Debounced realtime directory monitoring
//! - **Scheduler**: Periodic full scan passes
//! - **Quarantine**: Crash-safe storage, restore, and secure deletion
//! - **Orchestrator**: The protection session tying it all together
//! - **Audit**: Structured logging of every detection and action

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod classifier;
pub mod core;
pub mod orchestrator;
pub mod quarantine;
pub mod scheduler;
pub mod watcher;

// Re-export commonly used types at the crate root
pub use crate::core::{
    FileHasher, ProtectionConfig, ProtectionError, ProtectionEvent, ProtectionStats,
    QuarantineError, ScanRecord, ThreatLevel, WatchError,
};

pub use crate::classifier::{Classifier, SuspiciousRules};
pub use crate::orchestrator::{ProtectionSession, SessionState};
pub use crate::quarantine::{FileVault, QuarantineId, QuarantineItem, QuarantineStore};
pub use crate::scheduler::BackgroundScanner;
pub use crate::watcher::{DirectoryWatcher, WatcherConfig};

/// Prelude module for convenient imports.
///
/// ```rust
/// use tempsentry::prelude::*;
/// ```
pub mod prelude {
    pub use crate::core::{
        FileHasher, ProtectionConfig, ProtectionError, ProtectionEvent, ProtectionStats,
        QuarantineError, ScanRecord, ThreatLevel, WatchError,
    };
    pub use crate::classifier::{Classifier, SuspiciousRules};
    pub use crate::orchestrator::{ProtectionSession, SessionState};
    pub use crate::quarantine::{FileVault, QuarantineId, QuarantineItem, QuarantineStore};
    pub use crate::scheduler::BackgroundScanner;
    pub use crate::watcher::{DirectoryWatcher, WatcherConfig};
}
