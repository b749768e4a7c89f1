//! Duplicate-event suppression for watched paths.
//!
//! Operating systems frequently deliver several notifications for one
//! logical file creation. A path seen within the debounce window is
//! ignored on subsequent events; entries expire from the set once the
//! window has passed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Time-windowed set of recently seen paths.
///
/// Critical sections are short: one map lookup/insert plus an expiry
/// sweep per call.
#[derive(Debug)]
pub struct DebounceSet {
    window: Duration,
    seen: Mutex<HashMap<PathBuf, Instant>>,
}

impl DebounceSet {
    /// Creates a set with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Records a sighting of `path`.
    ///
    /// Returns `true` when the path has not been seen within the window
    /// and should be processed; `false` when it is a duplicate.
    pub fn first_sighting(&self, path: &Path) -> bool {
        let now = Instant::now();
        let mut seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        seen.retain(|_, last| now.duration_since(*last) < self.window);

        match seen.get(path) {
            Some(_) => false,
            None => {
                seen.insert(path.to_path_buf(), now);
                true
            }
        }
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let seen = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        seen.values()
            .filter(|last| now.duration_since(**last) < self.window)
            .count()
    }

    /// Returns `true` when no live entries remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_suppresses_duplicates_within_window() {
        let set = DebounceSet::new(Duration::from_secs(30));
        let path = Path::new("/tmp/new.exe");

        assert!(set.first_sighting(path));
        assert!(!set.first_sighting(path));
        assert!(!set.first_sighting(path));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_distinct_paths_pass() {
        let set = DebounceSet::new(Duration::from_secs(30));
        assert!(set.first_sighting(Path::new("/tmp/a.exe")));
        assert!(set.first_sighting(Path::new("/tmp/b.exe")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_entries_expire() {
        let set = DebounceSet::new(Duration::from_millis(20));
        let path = Path::new("/tmp/expiring.exe");

        assert!(set.first_sighting(path));
        sleep(Duration::from_millis(40));
        assert!(set.first_sighting(path));
    }
}
