//! Lock-free session counters.

use crate::core::ProtectionStats;

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

/// Shared mutable counters behind a protection session.
///
/// Counters use relaxed atomics: readers want a cheap, roughly current
/// snapshot, not a consistent cut across fields. The last-scan timestamp
/// sits behind a short-lived `RwLock` because `DateTime` is not atomic.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    active: AtomicBool,
    auto_clean: AtomicBool,
    threats_found: AtomicU64,
    threats_handled: AtomicU64,
    monitored_paths: AtomicUsize,
    last_scan: RwLock<Option<DateTime<Utc>>>,
}

impl SessionCounters {
    pub(crate) fn new(auto_clean: bool) -> Self {
        Self {
            auto_clean: AtomicBool::new(auto_clean),
            ..Self::default()
        }
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    pub(crate) fn set_auto_clean(&self, enabled: bool) {
        self.auto_clean.store(enabled, Ordering::Relaxed);
    }

    pub(crate) fn auto_clean(&self) -> bool {
        self.auto_clean.load(Ordering::Relaxed)
    }

    pub(crate) fn set_monitored_paths(&self, count: usize) {
        self.monitored_paths.store(count, Ordering::Relaxed);
    }

    pub(crate) fn record_detection(&self) {
        self.threats_found.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handled(&self) {
        self.threats_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan_pass(&self, completed_at: DateTime<Utc>) {
        let mut last = self
            .last_scan
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *last = Some(completed_at);
    }

    pub(crate) fn snapshot(&self) -> ProtectionStats {
        let last_scan = *self
            .last_scan
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        ProtectionStats {
            active: self.active.load(Ordering::Relaxed),
            auto_clean: self.auto_clean.load(Ordering::Relaxed),
            last_scan,
            threats_found: self.threats_found.load(Ordering::Relaxed),
            threats_handled: self.threats_handled.load(Ordering::Relaxed),
            monitored_paths: self.monitored_paths.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let counters = SessionCounters::new(true);
        counters.record_detection();
        counters.record_detection();
        counters.record_handled();
        counters.set_monitored_paths(3);

        let stats = counters.snapshot();
        assert_eq!(stats.threats_found, 2);
        assert_eq!(stats.threats_handled, 1);
        assert_eq!(stats.monitored_paths, 3);
        assert!(stats.auto_clean);
        assert!(!stats.active);
        assert!(stats.last_scan.is_none());
    }

    #[test]
    fn test_scan_pass_updates_last_scan() {
        let counters = SessionCounters::new(false);
        let now = Utc::now();
        counters.record_scan_pass(now);
        assert_eq!(counters.snapshot().last_scan, Some(now));
    }

    #[test]
    fn test_auto_clean_toggle() {
        let counters = SessionCounters::new(false);
        assert!(!counters.auto_clean());
        counters.set_auto_clean(true);
        assert!(counters.auto_clean());
    }
}
