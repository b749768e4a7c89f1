//! Quarantine record types.

use crate::core::ScanRecord;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a quarantined file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuarantineId(pub String);

impl QuarantineId {
    /// Creates a new random quarantine ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Creates a quarantine ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for QuarantineId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for QuarantineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for QuarantineId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for QuarantineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Persistent record of one quarantined file.
///
/// Records are append-only: created when a file enters quarantine,
/// removed on restore or purge, never mutated in between.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineItem {
    /// Unique identifier for this entry.
    pub id: QuarantineId,

    /// Absolute path the file was taken from.
    pub original_path: PathBuf,

    /// When the file entered quarantine.
    pub quarantined_at: DateTime<Utc>,

    /// The classification that triggered quarantine.
    pub scan_record: ScanRecord,

    /// Path of the relocated copy inside the quarantine directory.
    pub vault_path: PathBuf,
}

impl QuarantineItem {
    /// Creates a new item for a file entering quarantine.
    pub fn new(
        original_path: impl Into<PathBuf>,
        scan_record: ScanRecord,
        vault_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: QuarantineId::new(),
            original_path: original_path.into(),
            quarantined_at: Utc::now(),
            scan_record,
            vault_path: vault_path.into(),
        }
    }

    /// Returns `true` if this item is strictly older than the retention
    /// window ending now.
    pub fn is_older_than(&self, retention_days: i64) -> bool {
        self.quarantined_at < Utc::now() - Duration::days(retention_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ThreatLevel;

    fn make_item(age_days: i64) -> QuarantineItem {
        let record = ScanRecord::new("/tmp/x.exe", 10, ThreatLevel::Medium, "test");
        let mut item = QuarantineItem::new("/tmp/x.exe", record, "/vault/x.qdata");
        item.quarantined_at = Utc::now() - Duration::days(age_days);
        item
    }

    #[test]
    fn test_quarantine_id_unique() {
        assert_ne!(QuarantineId::new(), QuarantineId::new());
        assert_eq!(QuarantineId::from_string("fixed").as_str(), "fixed");
    }

    #[test]
    fn test_retention_boundary() {
        assert!(make_item(31).is_older_than(30));
        assert!(!make_item(29).is_older_than(30));
        assert!(!make_item(0).is_older_than(30));
    }

    #[test]
    fn test_item_serde_roundtrip() {
        let item = make_item(1);
        let json = serde_json::to_string(&item).unwrap();
        let parsed: QuarantineItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, item.id);
        assert_eq!(parsed.original_path, item.original_path);
    }
}
