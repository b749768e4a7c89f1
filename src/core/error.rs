//! Error types for the tempsentry library.
//!
//! This module provides structured, typed errors for all failure
//! scenarios. The library never panics in non-test code; every fallible
//! operation returns a `Result` so call sites handle retry and rollback
//! explicitly.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for quarantine and secure-delete operations.
///
/// The variants mirror the stages of the quarantine pipeline: source
/// lookup, copy, verification, metadata commit, and rollback. Transient
/// I/O errors are retried inside the store and never surface to callers.
#[derive(Debug, Error)]
pub enum QuarantineError {
    /// The source file or quarantine entry does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Path or id that could not be resolved.
        what: String,
    },

    /// The quarantine copy did not match the original after writing.
    #[error("copy verification failed for '{path}': {reason}")]
    CopyVerificationFailed {
        /// Source file that failed verification.
        path: PathBuf,
        /// What mismatched (size or content).
        reason: String,
    },

    /// A transient I/O failure, such as a sharing violation from another
    /// process still holding the file open. Retried automatically.
    #[error("transient I/O failure on '{path}': {source}")]
    IoTransient {
        /// Path the operation was touching.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing or renaming the metadata document failed. The store rolls
    /// back to the pre-operation state before returning this.
    #[error("metadata commit failed: {reason}")]
    MetadataCommitFailed {
        /// Description of the commit failure.
        reason: String,
    },

    /// Rollback failed, or an operation failed past the point where
    /// rollback is possible. The metadata document may be inconsistent
    /// with the quarantine directory; a backup snapshot is left behind
    /// for manual recovery.
    #[error("rollback failed after '{operation}': {reason}")]
    RollbackFailed {
        /// The operation whose rollback failed.
        operation: String,
        /// Description of the rollback failure.
        reason: String,
    },

    /// A non-transient I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata document could not be parsed.
    #[error("metadata document is corrupt: {reason}")]
    CorruptMetadata {
        /// Description of the parse failure.
        reason: String,
    },
}

impl QuarantineError {
    /// Creates a `NotFound` error for a path or id.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a `MetadataCommitFailed` error.
    pub fn commit_failed(reason: impl Into<String>) -> Self {
        Self::MetadataCommitFailed {
            reason: reason.into(),
        }
    }

    /// Creates a `RollbackFailed` error.
    pub fn rollback_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RollbackFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the operation can be retried transparently.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IoTransient { .. })
    }

    /// Returns `true` if this error means the store's on-disk state may
    /// be inconsistent and needs operator attention.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RollbackFailed { .. })
    }
}

/// Error type for filesystem watcher setup and operation.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The underlying notification backend failed.
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),
}

/// Error type for protection session lifecycle operations.
#[derive(Debug, Error)]
pub enum ProtectionError {
    /// Watcher registration failed during startup.
    #[error(transparent)]
    Watch(#[from] WatchError),

    /// The quarantine store could not be opened.
    #[error(transparent)]
    Quarantine(#[from] QuarantineError),

    /// Session configuration is invalid.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl ProtectionError {
    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let err = QuarantineError::IoTransient {
            path: PathBuf::from("/tmp/x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "sharing violation"),
        };
        assert!(err.is_transient());
        assert!(!err.is_fatal());

        let err = QuarantineError::rollback_failed("quarantine", "snapshot unreadable");
        assert!(err.is_fatal());
        assert!(!err.is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = QuarantineError::not_found("/tmp/missing.exe");
        assert!(err.to_string().contains("/tmp/missing.exe"));

        let err = QuarantineError::CopyVerificationFailed {
            path: PathBuf::from("/tmp/a.exe"),
            reason: "size mismatch".into(),
        };
        assert!(err.to_string().contains("size mismatch"));
    }
}
