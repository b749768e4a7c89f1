//! Periodic background scanning.
//!
//! Event-driven detection can miss files (watcher buffer overflow, a
//! directory that appeared after startup), so a full classification
//! pass over every configured directory runs on a fixed interval,
//! independent of the watcher.

use crate::classifier::Classifier;
use crate::core::ScanRecord;

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};

/// Runs full classification passes over the configured directories.
#[derive(Debug, Clone)]
pub struct BackgroundScanner {
    dirs: Vec<PathBuf>,
    classifier: Classifier,
    interval: Duration,
}

impl BackgroundScanner {
    /// Creates a scanner over the given directories.
    pub fn new(dirs: Vec<PathBuf>, classifier: Classifier, interval: Duration) -> Self {
        Self {
            dirs,
            classifier,
            interval,
        }
    }

    /// Returns the configured scan interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Classifies every file in every configured directory once.
    ///
    /// Classification is side-effect free, so candidates run through a
    /// worker pool bounded by the processor count. Missing directories
    /// and unreadable files are skipped with a log entry.
    pub async fn scan_pass(&self) -> Vec<ScanRecord> {
        let files = self.enumerate_files();
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        let semaphore = Arc::new(Semaphore::new(workers));

        let tasks = files.into_iter().map(|path| {
            let semaphore = Arc::clone(&semaphore);
            let classifier = self.classifier.clone();
            async move {
                // Closed only when the scanner is dropped mid-pass.
                let _permit = semaphore.acquire_owned().await.ok()?;
                let result = tokio::task::spawn_blocking(move || {
                    let outcome = classifier.classify_hashed(&path);
                    (path, outcome)
                })
                .await;

                match result {
                    Ok((_, Ok(record))) => record,
                    Ok((path, Err(e))) => {
                        tracing::debug!(
                            path = %path.display(),
                            error = %e,
                            "Skipping unreadable file during scan pass"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Classification task panicked");
                        None
                    }
                }
            }
        });

        let records: Vec<ScanRecord> = join_all(tasks).await.into_iter().flatten().collect();

        crate::audit::emit_scan_pass(self.dirs.len(), records.len());
        tracing::debug!(
            dirs = self.dirs.len(),
            detections = records.len(),
            "Background scan pass completed"
        );

        records
    }

    /// Runs scan passes on the configured interval until shutdown.
    ///
    /// The first pass starts immediately; each completed pass (empty or
    /// not) is reported as one batch so the consumer can track scan
    /// times.
    pub async fn run(
        self,
        batches: mpsc::Sender<Vec<ScanRecord>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let records = self.scan_pass().await;
                    if batches.send(records).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        tracing::debug!("Background scanner stopped");
    }

    fn enumerate_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.dirs {
            let entries = match std::fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(
                        path = %dir.display(),
                        error = %e,
                        "Scan directory unreadable, skipping"
                    );
                    continue;
                }
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_file() {
                    files.push(path);
                }
            }
        }
        files
    }
}
