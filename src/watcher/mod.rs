//! Real-time directory watching.
//!
//! For each configured directory, the watcher subscribes to file
//! creation and rename notifications (non-recursive), suppresses
//! duplicate events through a [`DebounceSet`], waits briefly for the
//! writer to finish flushing, and forwards surviving candidate paths
//! into the orchestrator's inbox.

pub mod debounce;

pub use debounce::DebounceSet;

use crate::core::WatchError;

use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Tuning knobs for the directory watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Suppression window for duplicate events on one path.
    pub debounce_window: Duration,

    /// How long to wait after an event before reading the file, giving
    /// the writing process time to finish flushing.
    pub settle_delay: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_window: Duration::from_secs(30),
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl WatcherConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debounce window.
    pub fn with_debounce_window(mut self, window: Duration) -> Self {
        self.debounce_window = window;
        self
    }

    /// Sets the settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// Watches configured directories and forwards candidate file paths.
///
/// Dropping the watcher unsubscribes from all paths and stops the
/// forwarding task.
pub struct DirectoryWatcher {
    // Held for its Drop side effect: unsubscribing from the OS.
    _backend: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl DirectoryWatcher {
    /// Starts watching `dirs`, sending each settled candidate path into
    /// `candidates`.
    ///
    /// Directories that do not exist are skipped with a warning rather
    /// than failing startup; the watcher degrades to monitoring only
    /// the paths that resolve. Must be called from within a tokio
    /// runtime.
    pub fn start(
        dirs: &[PathBuf],
        config: WatcherConfig,
        candidates: mpsc::Sender<PathBuf>,
    ) -> Result<Self, WatchError> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<PathBuf>();

        let mut backend = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Watch backend reported an error");
                        return;
                    }
                };
                if !is_candidate_event(&event.kind) {
                    return;
                }
                for path in event.paths {
                    // Receiver gone means the watcher is shutting down.
                    let _ = raw_tx.send(path);
                }
            },
            notify::Config::default(),
        )?;

        let mut watched = Vec::new();
        for dir in dirs {
            if !dir.is_dir() {
                tracing::warn!(path = %dir.display(), "Watch directory missing, skipping");
                continue;
            }
            match backend.watch(dir, RecursiveMode::NonRecursive) {
                Ok(()) => watched.push(dir.clone()),
                Err(e) => {
                    tracing::warn!(path = %dir.display(), error = %e, "Failed to watch directory, skipping");
                }
            }
        }

        if watched.is_empty() {
            tracing::warn!("No configured directory could be watched; realtime detection is idle");
        } else {
            tracing::info!(count = watched.len(), "Directory watcher started");
        }

        tokio::spawn(forward_candidates(raw_rx, config, candidates));

        Ok(Self {
            _backend: backend,
            watched,
        })
    }

    /// Returns the directories actually under watch.
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.watched
    }
}

impl std::fmt::Debug for DirectoryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatcher")
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

/// Returns `true` for event kinds that can introduce a new file:
/// creations and the destination side of renames.
fn is_candidate_event(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Both))
            | EventKind::Modify(ModifyKind::Name(RenameMode::Any))
    )
}

/// Debounces raw events and forwards settled candidates.
async fn forward_candidates(
    mut raw: mpsc::UnboundedReceiver<PathBuf>,
    config: WatcherConfig,
    candidates: mpsc::Sender<PathBuf>,
) {
    let debounce = Arc::new(DebounceSet::new(config.debounce_window));

    while let Some(path) = raw.recv().await {
        if !debounce.first_sighting(&path) {
            tracing::trace!(path = %path.display(), "Duplicate event debounced");
            continue;
        }

        let candidates = candidates.clone();
        let settle = config.settle_delay;
        tokio::spawn(async move {
            tokio::time::sleep(settle).await;

            // The file may have been transient (installer scratch
            // files); re-check before handing it to classification.
            if !path.is_file() {
                tracing::trace!(path = %path.display(), "Candidate vanished before settling");
                return;
            }
            let _ = candidates.send(path).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    fn fast_config() -> WatcherConfig {
        WatcherConfig::new()
            .with_settle_delay(Duration::from_millis(50))
            .with_debounce_window(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_new_file_is_forwarded() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let watcher =
            DirectoryWatcher::start(&[dir.path().to_path_buf()], fast_config(), tx).unwrap();
        assert_eq!(watcher.watched_paths().len(), 1);

        // Give the backend a moment to register before writing.
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(dir.path().join("dropped.exe"), b"payload").unwrap();

        let candidate = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no candidate within timeout")
            .expect("channel closed");
        assert_eq!(candidate.file_name().unwrap(), "dropped.exe");
    }

    #[tokio::test]
    async fn test_missing_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("does-not-exist");
        let (tx, _rx) = mpsc::channel(16);

        let watcher = DirectoryWatcher::start(
            &[missing, dir.path().to_path_buf()],
            fast_config(),
            tx,
        )
        .unwrap();

        assert_eq!(watcher.watched_paths().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_file_not_forwarded() {
        let dir = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let _watcher = DirectoryWatcher::start(
            &[dir.path().to_path_buf()],
            WatcherConfig::new()
                .with_settle_delay(Duration::from_millis(300))
                .with_debounce_window(Duration::from_secs(5)),
            tx,
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        let transient = dir.path().join("scratch.exe");
        fs::write(&transient, b"x").unwrap();
        fs::remove_file(&transient).unwrap();

        // Deleted before the settle delay elapsed, so nothing arrives.
        let outcome = timeout(Duration::from_millis(800), rx.recv()).await;
        assert!(outcome.is_err(), "transient file should not be forwarded");
    }
}
