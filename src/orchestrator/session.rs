//! The protection session lifecycle and detection pipeline.

use crate::audit;
use crate::classifier::{Classifier, SuspiciousRules};
use crate::core::{ProtectionConfig, ProtectionError, ProtectionEvent, ProtectionStats, ScanRecord};
use crate::orchestrator::stats::SessionCounters;
use crate::quarantine::QuarantineStore;
use crate::scheduler::BackgroundScanner;
use crate::watcher::{DirectoryWatcher, WatcherConfig};

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const CANDIDATE_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of a [`ProtectionSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No background work is running.
    Stopped,
    /// Startup is in progress.
    Starting,
    /// Watcher, scanner, and consumer are running.
    Active,
    /// Shutdown is in progress; in-flight detections are draining.
    Stopping,
}

impl SessionState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Active => 2,
            Self::Stopping => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Active,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Handles owned by a running session, torn down on stop.
struct SessionRuntime {
    watcher: DirectoryWatcher,
    shutdown: watch::Sender<bool>,
    scanner: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

/// Coordinates the watcher, the background scanner, the classifier, and
/// the quarantine store into one protection lifecycle.
///
/// Two producers feed detections into a single consumer task: the
/// realtime watcher sends candidate paths, the background scanner sends
/// batches of classified records. The consumer owns all dispatch, so
/// handling decisions are serialized without any shared locking.
///
/// `start` and `stop` are idempotent; calling either in the state it
/// would produce is a logged no-op and emits no event.
pub struct ProtectionSession {
    config: ProtectionConfig,
    watcher_config: WatcherConfig,
    classifier: Classifier,
    store: Arc<dyn QuarantineStore>,
    counters: Arc<SessionCounters>,
    events: broadcast::Sender<ProtectionEvent>,
    state: AtomicU8,
    runtime: Mutex<Option<SessionRuntime>>,
}

impl ProtectionSession {
    /// Creates a session over the given store. The session is created
    /// stopped; call [`start`](Self::start) to begin protection.
    pub fn new(config: ProtectionConfig, store: Arc<dyn QuarantineStore>) -> Self {
        let classifier = Classifier::new(SuspiciousRules::from_config(&config));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let counters = Arc::new(SessionCounters::new(config.auto_clean));

        Self {
            config,
            watcher_config: WatcherConfig::default(),
            classifier,
            store,
            counters,
            events,
            state: AtomicU8::new(SessionState::Stopped.as_u8()),
            runtime: Mutex::new(None),
        }
    }

    /// Replaces the watcher tuning, for embedders with unusual event
    /// latency requirements.
    pub fn with_watcher_config(mut self, watcher_config: WatcherConfig) -> Self {
        self.watcher_config = watcher_config;
        self
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` while protection is active.
    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Returns the quarantine store backing this session.
    pub fn store(&self) -> &Arc<dyn QuarantineStore> {
        &self.store
    }

    /// Subscribes to session events.
    ///
    /// Each receiver gets every event from the point of subscription;
    /// slow receivers lag rather than block detection.
    pub fn subscribe(&self) -> broadcast::Receiver<ProtectionEvent> {
        self.events.subscribe()
    }

    /// Returns a point-in-time snapshot of session statistics.
    pub fn stats(&self) -> ProtectionStats {
        self.counters.snapshot()
    }

    /// Enables or disables automatic handling of detections.
    ///
    /// Takes effect for the next detection; detections already dispatched
    /// finish under the flag value they observed.
    pub fn set_auto_clean(&self, enabled: bool) {
        self.counters.set_auto_clean(enabled);
        tracing::info!(enabled, "Auto-clean setting changed");
    }

    /// Starts protection: registers the watcher, launches the background
    /// scanner (which performs an immediate first pass), and begins
    /// consuming detections.
    ///
    /// Calling `start` on an already active session is a no-op and does
    /// not emit a second status event.
    pub async fn start(&self) -> Result<(), ProtectionError> {
        let mut runtime = self.runtime.lock().await;
        if runtime.is_some() {
            tracing::debug!("Protection already active, ignoring start");
            return Ok(());
        }
        self.state
            .store(SessionState::Starting.as_u8(), Ordering::Release);

        if self.config.scan_interval.is_zero() {
            self.state
                .store(SessionState::Stopped.as_u8(), Ordering::Release);
            return Err(ProtectionError::configuration(
                "scan interval must be non-zero",
            ));
        }

        let (candidate_tx, candidate_rx) = mpsc::channel(CANDIDATE_CHANNEL_CAPACITY);
        let (batch_tx, batch_rx) = mpsc::channel(4);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let watcher = match DirectoryWatcher::start(
            &self.config.watch_dirs,
            self.watcher_config.clone(),
            candidate_tx,
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                self.state
                    .store(SessionState::Stopped.as_u8(), Ordering::Release);
                return Err(e.into());
            }
        };
        self.counters
            .set_monitored_paths(watcher.watched_paths().len());

        let scanner = BackgroundScanner::new(
            self.config.watch_dirs.clone(),
            self.classifier.clone(),
            self.config.scan_interval,
        );
        let scanner_handle = tokio::spawn(scanner.run(batch_tx, shutdown_rx.clone()));

        let consumer_handle = tokio::spawn(consume_detections(
            candidate_rx,
            batch_rx,
            shutdown_rx,
            self.classifier.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.counters),
            self.events.clone(),
        ));

        *runtime = Some(SessionRuntime {
            watcher,
            shutdown: shutdown_tx,
            scanner: scanner_handle,
            consumer: consumer_handle,
        });
        self.state
            .store(SessionState::Active.as_u8(), Ordering::Release);
        self.counters.set_active(true);

        let _ = self.events.send(ProtectionEvent::StatusChanged { active: true });
        tracing::info!(
            dirs = self.config.watch_dirs.len(),
            auto_clean = self.counters.auto_clean(),
            "Protection started"
        );
        Ok(())
    }

    /// Stops protection, draining in-flight detections before returning.
    ///
    /// Calling `stop` on a stopped session is a no-op and emits no
    /// event.
    pub async fn stop(&self) {
        let mut runtime = self.runtime.lock().await;
        let Some(active) = runtime.take() else {
            tracing::debug!("Protection already stopped, ignoring stop");
            return;
        };
        self.state
            .store(SessionState::Stopping.as_u8(), Ordering::Release);

        // Unsubscribe from the OS first so no new candidates arrive,
        // then signal the loops.
        drop(active.watcher);
        let _ = active.shutdown.send(true);

        if let Err(e) = active.scanner.await {
            tracing::warn!(error = %e, "Background scanner did not shut down cleanly");
        }
        if let Err(e) = active.consumer.await {
            tracing::warn!(error = %e, "Detection consumer did not shut down cleanly");
        }

        self.state
            .store(SessionState::Stopped.as_u8(), Ordering::Release);
        self.counters.set_active(false);

        let _ = self
            .events
            .send(ProtectionEvent::StatusChanged { active: false });
        tracing::info!("Protection stopped");
    }

    /// Securely deletes every quarantined item older than the configured
    /// retention window. Returns the number purged.
    pub async fn purge_expired(&self) -> Result<usize, ProtectionError> {
        Ok(self
            .store
            .purge_expired(self.config.retention_days)
            .await?)
    }
}

impl std::fmt::Debug for ProtectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectionSession")
            .field("state", &self.state())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Single consumer over both detection producers.
async fn consume_detections(
    mut candidates: mpsc::Receiver<PathBuf>,
    mut batches: mpsc::Receiver<Vec<ScanRecord>>,
    mut shutdown: watch::Receiver<bool>,
    classifier: Classifier,
    store: Arc<dyn QuarantineStore>,
    counters: Arc<SessionCounters>,
    events: broadcast::Sender<ProtectionEvent>,
) {
    loop {
        tokio::select! {
            candidate = candidates.recv() => match candidate {
                Some(path) => {
                    if let Some(record) = classify_candidate(&classifier, path).await {
                        handle_detection(record, &store, &counters, &events).await;
                    }
                }
                None => break,
            },
            batch = batches.recv() => match batch {
                Some(records) => {
                    counters.record_scan_pass(Utc::now());
                    for record in records {
                        handle_detection(record, &store, &counters, &events).await;
                    }
                }
                None => break,
            },
            _ = shutdown.changed() => {
                // Drain whatever the producers managed to queue before
                // the signal, then exit.
                while let Ok(path) = candidates.try_recv() {
                    if let Some(record) = classify_candidate(&classifier, path).await {
                        handle_detection(record, &store, &counters, &events).await;
                    }
                }
                while let Ok(records) = batches.try_recv() {
                    counters.record_scan_pass(Utc::now());
                    for record in records {
                        handle_detection(record, &store, &counters, &events).await;
                    }
                }
                break;
            }
        }
    }

    tracing::debug!("Detection consumer stopped");
}

/// Classifies a realtime candidate path. Hashing is skipped here; the
/// next background pass picks the hash up if the file survives. The
/// metadata read runs on the blocking pool, as in the scheduler.
async fn classify_candidate(classifier: &Classifier, path: PathBuf) -> Option<ScanRecord> {
    let classifier = classifier.clone();
    let result = tokio::task::spawn_blocking(move || {
        let outcome = classifier.classify(&path);
        (path, outcome)
    })
    .await;

    match result {
        Ok((_, Ok(verdict))) => verdict,
        Ok((path, Err(e))) => {
            tracing::debug!(
                path = %path.display(),
                error = %e,
                "Candidate vanished or unreadable, skipping"
            );
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Classification task panicked");
            None
        }
    }
}

/// Counts, announces, and (under auto-clean) dispatches one detection.
///
/// Handling failures are logged and do not disturb the session; the
/// detection stays counted as found but not handled.
async fn handle_detection(
    record: ScanRecord,
    store: &Arc<dyn QuarantineStore>,
    counters: &Arc<SessionCounters>,
    events: &broadcast::Sender<ProtectionEvent>,
) {
    counters.record_detection();
    let auto_clean = counters.auto_clean();

    audit::emit_threat_detected(&record, auto_clean);
    let _ = events.send(ProtectionEvent::ThreatDetected {
        record: record.clone(),
        handled_automatically: auto_clean,
    });

    if !auto_clean {
        return;
    }

    let outcome = if record.level.warrants_deletion() {
        store.delete_file(&record.path).await
    } else {
        store.quarantine_file(&record.path, record.clone()).await.map(|_| ())
    };

    match outcome {
        Ok(()) => counters.record_handled(),
        Err(e) => {
            tracing::warn!(
                path = %record.path.display(),
                level = %record.level,
                error = %e,
                "Automatic handling failed, leaving file in place"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{QuarantineError, ThreatLevel};
    use crate::quarantine::{QuarantineId, QuarantineItem};
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    /// In-memory store that records which operation handled which path.
    #[derive(Debug, Default)]
    struct RecordingStore {
        calls: std::sync::Mutex<Vec<(String, PathBuf)>>,
        fail_all: bool,
    }

    impl RecordingStore {
        fn failing() -> Self {
            Self {
                fail_all: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, op: &str, path: &Path) -> Result<(), QuarantineError> {
            if self.fail_all {
                return Err(QuarantineError::not_found(path.display().to_string()));
            }
            self.calls
                .lock()
                .unwrap()
                .push((op.to_string(), path.to_path_buf()));
            Ok(())
        }
    }

    #[async_trait]
    impl QuarantineStore for RecordingStore {
        async fn quarantine_file(
            &self,
            path: &Path,
            _record: ScanRecord,
        ) -> Result<QuarantineId, QuarantineError> {
            self.record("quarantine", path)?;
            Ok(QuarantineId::new())
        }

        async fn delete_file(&self, path: &Path) -> Result<(), QuarantineError> {
            self.record("delete", path)
        }

        async fn restore_file(&self, _id: &QuarantineId) -> Result<(), QuarantineError> {
            Ok(())
        }

        async fn quarantined_items(&self) -> Result<Vec<QuarantineItem>, QuarantineError> {
            Ok(Vec::new())
        }

        async fn purge_expired(&self, _retention_days: i64) -> Result<usize, QuarantineError> {
            Ok(0)
        }
    }

    fn session_over(
        dir: &TempDir,
        auto_clean: bool,
        store: Arc<dyn QuarantineStore>,
    ) -> ProtectionSession {
        let config = ProtectionConfig::new()
            .with_watch_dir(dir.path())
            .with_suspicious_extensions([".exe"])
            .with_auto_clean(auto_clean)
            .with_scan_interval(Duration::from_secs(3600));
        ProtectionSession::new(config, store).with_watcher_config(
            WatcherConfig::new().with_settle_delay(Duration::from_millis(50)),
        )
    }

    async fn wait_until(deadline: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let start = std::time::Instant::now();
        while start.elapsed() < deadline {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        condition()
    }

    #[tokio::test]
    async fn test_double_start_emits_single_status_event() {
        let dir = TempDir::new().unwrap();
        let session = session_over(&dir, false, Arc::new(RecordingStore::default()));
        let mut events = session.subscribe();

        session.start().await.unwrap();
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Active);

        let first = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(first, ProtectionEvent::StatusChanged { active: true }));

        // No second status event from the redundant start.
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));

        session.stop().await;
        let last = timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(last, ProtectionEvent::StatusChanged { active: false }));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_silent() {
        let dir = TempDir::new().unwrap();
        let session = session_over(&dir, false, Arc::new(RecordingStore::default()));
        let mut events = session.subscribe();

        session.stop().await;

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(matches!(
            events.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_auto_clean_dispatches_by_level() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.exe"), b"x").unwrap();
        fs::write(dir.path().join("mimikatz.exe"), b"x").unwrap();

        let store = Arc::new(RecordingStore::default());
        let session = session_over(&dir, true, Arc::clone(&store) as Arc<dyn QuarantineStore>);
        session.start().await.unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || session.stats().threats_handled == 2).await,
            "detections were not handled in time"
        );
        session.stop().await;

        let calls = store.calls();
        let op_for = |name: &str| {
            calls
                .iter()
                .find(|(_, path)| path.file_name().unwrap() == name)
                .map(|(op, _)| op.as_str())
        };
        // Medium goes to quarantine, Critical is destroyed.
        assert_eq!(op_for("tool.exe"), Some("quarantine"));
        assert_eq!(op_for("mimikatz.exe"), Some("delete"));

        let stats = session.stats();
        assert_eq!(stats.threats_found, 2);
        assert_eq!(stats.threats_handled, 2);
        assert!(stats.last_scan.is_some());
        assert!(!stats.active);
    }

    #[tokio::test]
    async fn test_manual_mode_only_announces() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.exe"), b"x").unwrap();

        let store = Arc::new(RecordingStore::default());
        let session = session_over(&dir, false, Arc::clone(&store) as Arc<dyn QuarantineStore>);
        let mut events = session.subscribe();
        session.start().await.unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || session.stats().threats_found == 1).await,
            "detection did not arrive in time"
        );
        session.stop().await;

        assert!(store.calls().is_empty());
        assert_eq!(session.stats().threats_handled, 0);

        let mut saw_detection = false;
        while let Ok(event) = events.try_recv() {
            if let ProtectionEvent::ThreatDetected {
                record,
                handled_automatically,
            } = event
            {
                assert_eq!(record.file_name(), Some("tool.exe"));
                assert!(!handled_automatically);
                saw_detection = true;
            }
        }
        assert!(saw_detection);
    }

    #[tokio::test]
    async fn test_handling_failure_does_not_stop_session() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tool.exe"), b"x").unwrap();

        let session = session_over(&dir, true, Arc::new(RecordingStore::failing()));
        session.start().await.unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || session.stats().threats_found == 1).await,
            "detection did not arrive in time"
        );
        assert_eq!(session.stats().threats_handled, 0);
        assert!(session.is_active());

        session.stop().await;
    }

    #[tokio::test]
    async fn test_realtime_candidate_flows_through() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RecordingStore::default());
        let session = session_over(&dir, true, Arc::clone(&store) as Arc<dyn QuarantineStore>);
        session.start().await.unwrap();

        // Give the watcher backend a moment to register, then drop a
        // threat into the watched directory.
        tokio::time::sleep(Duration::from_millis(200)).await;
        fs::write(dir.path().join("dropped.bad.exe"), b"payload").unwrap();

        assert!(
            wait_until(Duration::from_secs(5), || {
                store
                    .calls()
                    .iter()
                    .any(|(op, path)| op == "delete" && path.ends_with("dropped.bad.exe"))
            })
            .await,
            "realtime detection was not dispatched"
        );
        session.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_rejected() {
        let dir = TempDir::new().unwrap();
        let config = ProtectionConfig::new()
            .with_watch_dir(dir.path())
            .with_scan_interval(Duration::ZERO);
        let session = ProtectionSession::new(config, Arc::new(RecordingStore::default()));

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, ProtectionError::Configuration { .. }));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let dir = TempDir::new().unwrap();
        let session = session_over(&dir, false, Arc::new(RecordingStore::default()));

        session.start().await.unwrap();
        session.stop().await;
        session.start().await.unwrap();
        assert!(session.is_active());
        session.stop().await;
    }
}
