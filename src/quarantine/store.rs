//! The filesystem quarantine vault.
//!
//! `FileVault` owns a quarantine directory and a single JSON metadata
//! document mapping id → [`QuarantineItem`]. The document on disk is
//! always either the previous valid state or the new valid state: every
//! update is written to a temporary file and renamed over the live
//! document, and a timestamped backup snapshot is taken before each
//! risky operation so rollback is always possible.
//!
//! # Directory layout
//!
//! ```text
//! vault/
//! ├── quarantine.json              # metadata document (atomic commits)
//! ├── quarantine.json.bak-<ts>     # backup snapshot, removed on success
//! └── <uuid>.qdata                 # one copy per quarantined item
//! ```

use crate::core::{QuarantineError, ScanRecord};
use crate::quarantine::record::{QuarantineId, QuarantineItem};
use crate::quarantine::retry::{retry_transient, RetryPolicy};
use crate::quarantine::traits::QuarantineStore;
use crate::quarantine::wipe::{secure_wipe, DEFAULT_WIPE_PASSES};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

/// File name of the metadata document inside the vault directory.
const METADATA_FILE: &str = "quarantine.json";

/// Extension given to quarantined copies.
const DATA_EXTENSION: &str = "qdata";

/// Chunk size for streamed byte comparison.
const COMPARE_CHUNK: usize = 64 * 1024;

/// Filesystem-backed quarantine store with crash-safe metadata.
///
/// All mutating operations serialize on one internal mutex: quarantine
/// is a rare operation, and correctness of the shared metadata document
/// is prioritized over throughput.
#[derive(Debug)]
pub struct FileVault {
    /// Vault directory holding copies and the metadata document.
    base_dir: PathBuf,
    /// Path of the live metadata document.
    metadata_path: PathBuf,
    /// Files at or above this size are verified by size only.
    verify_byte_threshold: u64,
    /// Forces full byte verification regardless of size.
    always_full_verify: bool,
    /// Retry policy for transient copy failures.
    retry: RetryPolicy,
    /// Serialized mutable state: the in-memory index.
    index: Mutex<HashMap<String, QuarantineItem>>,
    #[cfg(test)]
    faults: FaultInjection,
}

/// One-shot fault switches so tests can drive the failure branches of
/// the quarantine pipeline, which are unreachable from outside the
/// vault (the copy name is a fresh UUID and verification reads the copy
/// the vault just wrote).
#[cfg(test)]
#[derive(Debug, Default)]
struct FaultInjection {
    corrupt_next_copy: std::sync::atomic::AtomicBool,
    fail_next_commit: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FaultInjection {
    fn corrupt_copy(&self, copy: &Path) {
        use std::sync::atomic::Ordering;
        if self.corrupt_next_copy.swap(false, Ordering::SeqCst) {
            if let Ok(mut bytes) = std::fs::read(copy) {
                for b in &mut bytes {
                    *b ^= 0xFF;
                }
                let _ = std::fs::write(copy, bytes);
            }
        }
    }

    fn take_commit_failure(&self) -> bool {
        use std::sync::atomic::Ordering;
        self.fail_next_commit.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
impl FileVault {
    /// Flips the bytes of the next quarantine copy before verification.
    fn inject_copy_corruption(&self) {
        self.faults
            .corrupt_next_copy
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// Makes the next metadata commit fail.
    fn inject_commit_failure(&self) {
        self.faults
            .fail_next_commit
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl FileVault {
    /// Opens (or creates) a vault at the given directory and loads any
    /// existing metadata document.
    ///
    /// Leftover backup snapshots from an earlier crash are reported at
    /// warn level so an operator can reconcile them.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, QuarantineError> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;

        let metadata_path = base_dir.join(METADATA_FILE);
        let index = load_document(&metadata_path)?;
        report_stale_backups(&base_dir);

        tracing::debug!(
            vault = %base_dir.display(),
            items = index.len(),
            "Quarantine vault opened"
        );

        Ok(Self {
            base_dir,
            metadata_path,
            verify_byte_threshold: 10 * 1024 * 1024,
            always_full_verify: false,
            retry: RetryPolicy::default(),
            index: Mutex::new(index),
            #[cfg(test)]
            faults: FaultInjection::default(),
        })
    }

    /// Sets the size threshold below which copies are byte-verified.
    pub fn with_verify_byte_threshold(mut self, bytes: u64) -> Self {
        self.verify_byte_threshold = bytes;
        self
    }

    /// Forces full byte verification for every copy.
    pub fn with_always_full_verify(mut self, enabled: bool) -> Self {
        self.always_full_verify = enabled;
        self
    }

    /// Sets the retry policy for transient copy failures.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the vault directory.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn data_path(&self, id: &QuarantineId) -> PathBuf {
        self.base_dir.join(format!("{}.{}", id.as_str(), DATA_EXTENSION))
    }

    /// Copies the live metadata document to a timestamped backup file.
    /// Returns `None` when no document exists yet.
    fn snapshot_metadata(&self) -> Result<Option<PathBuf>, QuarantineError> {
        if !self.metadata_path.exists() {
            return Ok(None);
        }
        let backup = self.base_dir.join(format!(
            "{}.bak-{}",
            METADATA_FILE,
            Utc::now().format("%Y%m%d%H%M%S%3f")
        ));
        std::fs::copy(&self.metadata_path, &backup)?;
        Ok(Some(backup))
    }

    /// Writes the index to a temporary file and renames it over the
    /// live document. The rename is the single commit point.
    fn commit_document(
        &self,
        index: &HashMap<String, QuarantineItem>,
    ) -> Result<(), QuarantineError> {
        #[cfg(test)]
        if self.faults.take_commit_failure() {
            return Err(QuarantineError::commit_failed("injected failure"));
        }

        let json = serde_json::to_vec_pretty(index)
            .map_err(|e| QuarantineError::commit_failed(format!("serialize: {e}")))?;

        let temp = self
            .base_dir
            .join(format!("{}.tmp-{}", METADATA_FILE, Uuid::new_v4()));
        std::fs::write(&temp, &json)
            .map_err(|e| QuarantineError::commit_failed(format!("temp write: {e}")))?;

        if let Err(e) = std::fs::rename(&temp, &self.metadata_path) {
            let _ = std::fs::remove_file(&temp);
            return Err(QuarantineError::commit_failed(format!("rename: {e}")));
        }
        Ok(())
    }

    /// Restores the live document from a backup snapshot.
    fn restore_snapshot(&self, backup: &Path) -> Result<(), QuarantineError> {
        std::fs::copy(backup, &self.metadata_path).map_err(|e| {
            QuarantineError::rollback_failed("metadata restore", e.to_string())
        })?;
        Ok(())
    }

    /// Verifies a quarantine copy against its source. Sizes are always
    /// compared; content is compared byte-for-byte below the configured
    /// threshold (a deliberate space/confidence trade-off above it).
    fn verify_copy(&self, source: &Path, copy: &Path) -> Result<(), QuarantineError> {
        let source_len = std::fs::metadata(source)?.len();
        let copy_len = std::fs::metadata(copy)?.len();

        if source_len != copy_len {
            return Err(QuarantineError::CopyVerificationFailed {
                path: source.to_path_buf(),
                reason: format!("size mismatch: source {source_len}, copy {copy_len}"),
            });
        }

        if self.always_full_verify || source_len < self.verify_byte_threshold {
            if !files_equal(source, copy)? {
                return Err(QuarantineError::CopyVerificationFailed {
                    path: source.to_path_buf(),
                    reason: "content mismatch".into(),
                });
            }
        }

        Ok(())
    }

    /// Copies the source into the vault, retrying transient sharing
    /// violations with backoff.
    async fn copy_with_retry(
        &self,
        source: &Path,
        dest: &Path,
    ) -> Result<(), QuarantineError> {
        retry_transient(
            &self.retry,
            |e: &QuarantineError| e.is_transient(),
            || async {
                tokio::fs::copy(source, dest).await.map_err(|e| {
                    if is_transient_io(&e) {
                        QuarantineError::IoTransient {
                            path: source.to_path_buf(),
                            source: e,
                        }
                    } else {
                        QuarantineError::Io(e)
                    }
                })?;
                Ok(())
            },
        )
        .await
        .map_err(|e| match e {
            // Retries exhausted; the transient wrapper must not escape
            // the store.
            QuarantineError::IoTransient { source, .. } => QuarantineError::Io(source),
            other => other,
        })
    }
}

#[async_trait]
impl QuarantineStore for FileVault {
    async fn quarantine_file(
        &self,
        path: &Path,
        record: ScanRecord,
    ) -> Result<QuarantineId, QuarantineError> {
        if !path.exists() {
            return Err(QuarantineError::not_found(path.display().to_string()));
        }

        // All quarantine/delete operations serialize here; the guard's
        // drop releases the lock on every exit path.
        let mut index = self.index.lock().await;

        let backup = self.snapshot_metadata()?;

        let item = QuarantineItem::new(path, record, PathBuf::new());
        let id = item.id.clone();
        let vault_path = self.data_path(&id);
        let item = QuarantineItem {
            vault_path: vault_path.clone(),
            ..item
        };

        if let Err(e) = self.copy_with_retry(path, &vault_path).await {
            let _ = std::fs::remove_file(&vault_path);
            return Err(e);
        }

        #[cfg(test)]
        self.faults.corrupt_copy(&vault_path);

        if let Err(e) = self.verify_copy(path, &vault_path) {
            // The original and the metadata document are untouched at
            // this point; only the failed copy needs cleanup.
            let _ = std::fs::remove_file(&vault_path);
            return Err(e);
        }

        index.insert(id.as_str().to_string(), item.clone());
        if let Err(commit_err) = self.commit_document(&index) {
            index.remove(id.as_str());
            let _ = std::fs::remove_file(&vault_path);
            if let Some(ref backup) = backup {
                self.restore_snapshot(backup)?;
            }
            return Err(commit_err);
        }

        // The commit has succeeded: the entry exists from here on, which
        // is why the original is destroyed only now. Destroying it first
        // would make a failed commit unrecoverable.
        if let Err(e) = secure_wipe(path, DEFAULT_WIPE_PASSES) {
            tracing::error!(
                quarantine_id = %id,
                path = %path.display(),
                error = %e,
                "Original could not be destroyed after quarantine commit"
            );
        } else if let Some(backup) = backup {
            let _ = std::fs::remove_file(backup);
        }

        crate::audit::emit_quarantined(&item);
        tracing::info!(
            quarantine_id = %id,
            path = %path.display(),
            level = %item.scan_record.level,
            "File quarantined"
        );

        Ok(id)
    }

    async fn delete_file(&self, path: &Path) -> Result<(), QuarantineError> {
        if !path.exists() {
            return Err(QuarantineError::not_found(path.display().to_string()));
        }

        let _index = self.index.lock().await;
        secure_wipe(path, DEFAULT_WIPE_PASSES)?;

        crate::audit::emit_secure_delete(path);
        tracing::info!(path = %path.display(), "File securely deleted");
        Ok(())
    }

    async fn restore_file(&self, id: &QuarantineId) -> Result<(), QuarantineError> {
        let mut index = self.index.lock().await;

        let item = index
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| QuarantineError::not_found(id.to_string()))?;

        let backup = self.snapshot_metadata()?;

        move_file(&item.vault_path, &item.original_path).await?;

        index.remove(id.as_str());
        if let Err(commit_err) = self.commit_document(&index) {
            // Undo the move so disk state matches the still-live
            // previous document.
            index.insert(id.as_str().to_string(), item.clone());
            if let Err(undo) = move_file(&item.original_path, &item.vault_path).await {
                return Err(QuarantineError::rollback_failed(
                    "restore",
                    format!("commit failed ({commit_err}) and undo move failed ({undo})"),
                ));
            }
            if let Some(ref backup) = backup {
                self.restore_snapshot(backup)?;
            }
            return Err(commit_err);
        }

        if let Some(backup) = backup {
            let _ = std::fs::remove_file(backup);
        }

        crate::audit::emit_restored(&item);
        tracing::info!(
            quarantine_id = %id,
            path = %item.original_path.display(),
            "File restored from quarantine"
        );
        Ok(())
    }

    async fn quarantined_items(&self) -> Result<Vec<QuarantineItem>, QuarantineError> {
        let index = self.index.lock().await;
        let mut items: Vec<_> = index.values().cloned().collect();
        items.sort_by(|a, b| b.quarantined_at.cmp(&a.quarantined_at));
        Ok(items)
    }

    async fn purge_expired(&self, retention_days: i64) -> Result<usize, QuarantineError> {
        let mut index = self.index.lock().await;

        let expired: Vec<QuarantineItem> = index
            .values()
            .filter(|item| item.is_older_than(retention_days))
            .cloned()
            .collect();

        if expired.is_empty() {
            return Ok(0);
        }

        let backup = self.snapshot_metadata()?;

        let mut purged = 0usize;
        for item in &expired {
            match secure_wipe(&item.vault_path, DEFAULT_WIPE_PASSES) {
                Ok(()) | Err(QuarantineError::NotFound { .. }) => {
                    index.remove(item.id.as_str());
                    crate::audit::emit_purged(item);
                    purged += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        quarantine_id = %item.id,
                        error = %e,
                        "Failed to wipe expired quarantine copy; keeping entry"
                    );
                }
            }
        }

        if let Err(e) = self.commit_document(&index) {
            // The copies are already destroyed; the document cannot be
            // rolled back to a state that matches the directory.
            return Err(QuarantineError::rollback_failed(
                "purge",
                format!("commit failed after wiping {purged} copies: {e}"),
            ));
        }

        if let Some(backup) = backup {
            let _ = std::fs::remove_file(backup);
        }

        tracing::info!(purged, retention_days, "Expired quarantine items purged");
        Ok(purged)
    }
}

/// Loads the metadata document, returning an empty index when none
/// exists yet.
fn load_document(path: &Path) -> Result<HashMap<String, QuarantineItem>, QuarantineError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| QuarantineError::CorruptMetadata {
        reason: e.to_string(),
    })
}

/// Warns about backup snapshots left behind by a crashed operation.
fn report_stale_backups(base_dir: &Path) {
    let Ok(entries) = std::fs::read_dir(base_dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&format!("{METADATA_FILE}.bak-")) {
            tracing::warn!(
                snapshot = %entry.path().display(),
                "Stale metadata backup found; a previous operation may not have completed"
            );
        }
    }
}

/// Moves a file, falling back to copy + remove across filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), QuarantineError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

/// Streamed byte-for-byte comparison of two files.
fn files_equal(a: &Path, b: &Path) -> Result<bool, QuarantineError> {
    let mut reader_a = std::io::BufReader::new(std::fs::File::open(a)?);
    let mut reader_b = std::io::BufReader::new(std::fs::File::open(b)?);
    let mut buf_a = vec![0u8; COMPARE_CHUNK];
    let mut buf_b = vec![0u8; COMPARE_CHUNK];

    loop {
        let n_a = read_full(&mut reader_a, &mut buf_a)?;
        let n_b = read_full(&mut reader_b, &mut buf_b)?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Reads until the buffer is full or EOF; returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = reader.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Classifies I/O errors that another process's open handle can cause
/// and that deserve a retry.
fn is_transient_io(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::PermissionDenied
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::TimedOut
    )
}
