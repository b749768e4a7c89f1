//! Core types used throughout the tempsentry library.
//!
//! This module defines the fundamental data structures for representing
//! classification outcomes, threat levels, protection statistics, and the
//! events a protection session emits to its consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Severity level assigned to a classified file.
///
/// The total order drives the auto-handling policy: `High` and `Critical`
/// detections are securely deleted, `Low` and `Medium` detections are
/// quarantined so they can be restored later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    /// Low severity - potentially unwanted, no known malicious behavior.
    Low,
    /// Medium severity - suspicious by file type or origin.
    Medium,
    /// High severity - strong heuristic indicators of malice.
    High,
    /// Critical severity - known offensive tooling, act immediately.
    Critical,
}

impl ThreatLevel {
    /// Returns the level as a numeric score (0-100).
    pub fn score(&self) -> u8 {
        match self {
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 100,
        }
    }

    /// Returns `true` if a detection at this level is destroyed rather
    /// than quarantined when auto-clean is enabled.
    pub fn warrants_deletion(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// One classification outcome for a single file.
///
/// Produced by the classifier, consumed by the orchestrator and embedded
/// into quarantine metadata. Immutable once created; instances are cheap
/// value objects passed by clone between components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Absolute path of the classified file at detection time.
    pub path: PathBuf,

    /// File size in bytes.
    pub size: u64,

    /// Filesystem creation timestamp, where the platform provides one.
    pub created_at: Option<DateTime<Utc>>,

    /// Filesystem modification timestamp.
    pub modified_at: Option<DateTime<Utc>>,

    /// When the classification was performed.
    pub detected_at: DateTime<Utc>,

    /// Assigned threat level.
    pub level: ThreatLevel,

    /// Human-readable explanation of which rule matched.
    pub reason: String,

    /// BLAKE3 content hash. `None` for realtime detections, where the
    /// file is classified from metadata alone before its bytes settle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ScanRecord {
    /// Creates a new record with required fields.
    pub fn new(
        path: impl Into<PathBuf>,
        size: u64,
        level: ThreatLevel,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            created_at: None,
            modified_at: None,
            detected_at: Utc::now(),
            level,
            reason: reason.into(),
            content_hash: None,
        }
    }

    /// Sets the filesystem timestamps.
    pub fn with_timestamps(
        mut self,
        created: Option<DateTime<Utc>>,
        modified: Option<DateTime<Utc>>,
    ) -> Self {
        self.created_at = created;
        self.modified_at = modified;
        self
    }

    /// Sets the content hash.
    pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// Returns the file name component of the recorded path, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Snapshot of a protection session's counters and flags.
///
/// Derived on demand from in-memory state; never persisted. Counter
/// values are approximate-but-monotonic since they are read without
/// locking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtectionStats {
    /// Whether the session is currently active.
    pub active: bool,

    /// Whether detections are handled automatically.
    pub auto_clean: bool,

    /// Completion time of the most recent background scan pass.
    pub last_scan: Option<DateTime<Utc>>,

    /// Cumulative number of threats detected.
    pub threats_found: u64,

    /// Cumulative number of threats handled (quarantined or deleted).
    pub threats_handled: u64,

    /// Number of directories under watch.
    pub monitored_paths: usize,
}

/// Event emitted by a protection session.
///
/// Delivered over a broadcast channel so the consuming layer (tray
/// notifications, dashboards, logs) stays decoupled from detection.
#[derive(Debug, Clone)]
pub enum ProtectionEvent {
    /// A file was classified as a threat.
    ThreatDetected {
        /// The classification outcome.
        record: ScanRecord,
        /// Whether auto-clean will handle this detection.
        handled_automatically: bool,
    },

    /// The session transitioned between active and stopped.
    StatusChanged {
        /// `true` when protection became active.
        active: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::Medium < ThreatLevel::High);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
    }

    #[test]
    fn test_threat_level_policy_split() {
        assert!(!ThreatLevel::Low.warrants_deletion());
        assert!(!ThreatLevel::Medium.warrants_deletion());
        assert!(ThreatLevel::High.warrants_deletion());
        assert!(ThreatLevel::Critical.warrants_deletion());
    }

    #[test]
    fn test_scan_record_builder() {
        let record = ScanRecord::new(
            "/tmp/evil.exe",
            512,
            ThreatLevel::Medium,
            "suspicious extension",
        )
        .with_content_hash("abc123");

        assert_eq!(record.file_name(), Some("evil.exe"));
        assert_eq!(record.content_hash.as_deref(), Some("abc123"));
        assert_eq!(record.level, ThreatLevel::Medium);
    }

    #[test]
    fn test_scan_record_serde_omits_missing_hash() {
        let record = ScanRecord::new("/tmp/a.exe", 1, ThreatLevel::Low, "r");
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("content_hash"));
    }
}
