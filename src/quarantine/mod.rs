//! Crash-safe quarantine storage and secure deletion.
//!
//! - [`record`] - quarantine ids and persistent items
//! - [`traits`] - the `QuarantineStore` seam
//! - [`store`] - the filesystem `FileVault` implementation
//! - [`wipe`] - multi-pass secure destruction
//! - [`retry`] - transient I/O retry policy

pub mod record;
pub mod retry;
pub mod store;
pub mod traits;
pub mod wipe;

pub use record::{QuarantineId, QuarantineItem};
pub use retry::RetryPolicy;
pub use store::FileVault;
pub use traits::QuarantineStore;
pub use wipe::{secure_wipe, DEFAULT_WIPE_PASSES};
