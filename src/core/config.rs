//! Protection session configuration.
//!
//! The configuration surface is supplied by the embedding application
//! (settings file, UI) and injected into the core via constructors;
//! no component reads ambient global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a protection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionConfig {
    /// Directories to watch for new files and to sweep during
    /// background scans.
    pub watch_dirs: Vec<PathBuf>,

    /// Extensions considered suspicious (lowercase, with leading dot).
    pub suspicious_extensions: Vec<String>,

    /// How long quarantined items are retained before purge eligibility.
    pub retention_days: i64,

    /// Whether detections are handled automatically on arrival.
    pub auto_clean: bool,

    /// Interval between background scan passes.
    #[serde(with = "duration_secs")]
    pub scan_interval: Duration,

    /// Files at or above this size are verified by size comparison only
    /// after the quarantine copy; smaller files get a full byte
    /// comparison. A space/confidence trade-off, not a correctness
    /// requirement, hence configurable.
    pub verify_byte_threshold: u64,

    /// Forces full byte verification regardless of size.
    pub always_full_verify: bool,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            watch_dirs: Vec::new(),
            suspicious_extensions: vec![
                ".exe".into(),
                ".bat".into(),
                ".cmd".into(),
                ".ps1".into(),
                ".vbs".into(),
                ".scr".into(),
            ],
            retention_days: 30,
            auto_clean: false,
            scan_interval: Duration::from_secs(600),
            verify_byte_threshold: 10 * 1024 * 1024, // 10 MiB
            always_full_verify: false,
        }
    }
}

impl ProtectionConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory to watch.
    pub fn with_watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.watch_dirs.push(dir.into());
        self
    }

    /// Replaces the suspicious extension set.
    pub fn with_suspicious_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suspicious_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the quarantine retention period in days.
    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Enables or disables automatic handling of detections.
    pub fn with_auto_clean(mut self, enabled: bool) -> Self {
        self.auto_clean = enabled;
        self
    }

    /// Sets the background scan interval.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Sets the full-verification size threshold.
    pub fn with_verify_byte_threshold(mut self, bytes: u64) -> Self {
        self.verify_byte_threshold = bytes;
        self
    }

    /// Enables or disables unconditional full byte verification.
    pub fn with_always_full_verify(mut self, enabled: bool) -> Self {
        self.always_full_verify = enabled;
        self
    }
}

/// Serde helper serializing `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
