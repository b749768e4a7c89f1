//! Quarantine store trait definition.

use crate::core::{QuarantineError, ScanRecord};
use crate::quarantine::record::{QuarantineId, QuarantineItem};

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// Trait for quarantine storage implementations.
///
/// The production implementation is [`FileVault`](crate::quarantine::FileVault);
/// the trait exists so the orchestrator can be exercised against a test
/// double without touching the filesystem.
#[async_trait]
pub trait QuarantineStore: Send + Sync + Debug {
    /// Moves a file into quarantine durably.
    ///
    /// On success the original file no longer exists, a binary-identical
    /// copy lives in the quarantine directory, and the metadata document
    /// records the entry. On failure no observable state has changed.
    async fn quarantine_file(
        &self,
        path: &Path,
        record: ScanRecord,
    ) -> Result<QuarantineId, QuarantineError>;

    /// Permanently destroys a file with a multi-pass overwrite.
    ///
    /// No metadata is recorded; deletion is unconditional and
    /// irreversible.
    async fn delete_file(&self, path: &Path) -> Result<(), QuarantineError>;

    /// Moves a quarantined file back to its recorded original path and
    /// removes its metadata entry.
    async fn restore_file(&self, id: &QuarantineId) -> Result<(), QuarantineError>;

    /// Returns all quarantined items, newest first.
    async fn quarantined_items(&self) -> Result<Vec<QuarantineItem>, QuarantineError>;

    /// Securely deletes every item strictly older than the retention
    /// window and removes its entry. Returns the number purged.
    async fn purge_expired(&self, retention_days: i64) -> Result<usize, QuarantineError>;

    /// Gets a single item by id.
    async fn get_item(&self, id: &QuarantineId) -> Result<QuarantineItem, QuarantineError> {
        self.quarantined_items()
            .await?
            .into_iter()
            .find(|item| &item.id == id)
            .ok_or_else(|| QuarantineError::not_found(id.to_string()))
    }

    /// Returns the number of quarantined items.
    async fn count(&self) -> Result<usize, QuarantineError> {
        Ok(self.quarantined_items().await?.len())
    }

    /// Checks whether a given original path is currently quarantined.
    async fn contains_path(&self, path: &Path) -> Result<bool, QuarantineError> {
        Ok(self
            .quarantined_items()
            .await?
            .iter()
            .any(|item| item.original_path == path))
    }
}
