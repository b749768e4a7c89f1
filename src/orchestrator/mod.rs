//! Protection session orchestration.
//!
//! The orchestrator wires the other subsystems together: it owns the
//! watcher registrations and the scan timer, funnels every detection
//! through one consumer, applies the auto-clean policy against the
//! quarantine store, and publishes events and statistics to the
//! embedding application.

pub mod session;
mod stats;

pub use session::{ProtectionSession, SessionState};
