//! The heuristic classification engine.
//!
//! Classification is a pure function of a file's name and metadata:
//! deterministic, side-effect free, and independent of scan order, so
//! many candidates can be classified in parallel without coordination.

use crate::classifier::rules::SuspiciousRules;
use crate::core::{FileHasher, ScanRecord, ThreatLevel};

use chrono::{DateTime, Utc};
use std::path::Path;

/// Heuristic threat classifier.
///
/// Rules are evaluated independently and combined by taking the maximum
/// resulting level:
///
/// - suspicious extension → [`ThreatLevel::Medium`]
/// - known offensive-tool token in the name → [`ThreatLevel::Critical`]
/// - double extension masquerade (`invoice.pdf.exe`) → [`ThreatLevel::High`]
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: SuspiciousRules,
}

impl Classifier {
    /// Creates a classifier with the given rules.
    pub fn new(rules: SuspiciousRules) -> Self {
        Self { rules }
    }

    /// Returns a reference to the rules in effect.
    pub fn rules(&self) -> &SuspiciousRules {
        &self.rules
    }

    /// Evaluates the rule set against a bare file name.
    ///
    /// Returns the highest matched level and its reason, or `None` when
    /// no rule matched. This is the pure core of the classifier.
    pub fn evaluate_name(&self, file_name: &str) -> Option<(ThreatLevel, String)> {
        let extension = name_extension(file_name);
        let suspicious_ext = extension
            .as_deref()
            .map(|e| self.rules.is_suspicious_extension(e))
            .unwrap_or(false);

        let mut verdict: Option<(ThreatLevel, String)> = None;
        let mut consider = |level: ThreatLevel, reason: String| match &verdict {
            Some((current, _)) if *current >= level => {}
            _ => verdict = Some((level, reason)),
        };

        if suspicious_ext {
            let ext = extension.as_deref().unwrap_or_default();
            consider(
                ThreatLevel::Medium,
                format!("suspicious extension '{ext}'"),
            );
        }

        if let Some(token) = self.rules.matched_tool_token(file_name) {
            consider(
                ThreatLevel::Critical,
                format!("known hacker tool '{token}'"),
            );
        }

        if suspicious_ext && file_name.matches('.').count() > 1 {
            consider(
                ThreatLevel::High,
                format!("double extension masquerade '{file_name}'"),
            );
        }

        verdict
    }

    /// Classifies an existing file from its name and filesystem metadata.
    ///
    /// Returns `Ok(None)` when no rule matched. Fails if the file does
    /// not exist or its metadata cannot be read.
    pub fn classify(&self, path: &Path) -> std::io::Result<Option<ScanRecord>> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Ok(None);
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };

        let Some((level, reason)) = self.evaluate_name(file_name) else {
            return Ok(None);
        };

        let created = metadata.created().ok().map(DateTime::<Utc>::from);
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

        Ok(Some(
            ScanRecord::new(path, metadata.len(), level, reason)
                .with_timestamps(created, modified),
        ))
    }

    /// Classifies a file and, on a match, records its content hash.
    ///
    /// Used by background scans; realtime detections skip hashing and
    /// leave the hash unset.
    pub fn classify_hashed(&self, path: &Path) -> std::io::Result<Option<ScanRecord>> {
        let Some(record) = self.classify(path)? else {
            return Ok(None);
        };

        match FileHasher::new().hash_file(path) {
            Ok(hash) => Ok(Some(record.with_content_hash(hash))),
            Err(e) => {
                // The verdict stands even when the hash cannot be taken.
                tracing::debug!(path = %path.display(), error = %e, "Hashing flagged file failed");
                Ok(Some(record))
            }
        }
    }
}

/// Extracts the extension (with leading dot) from a bare file name.
fn name_extension(file_name: &str) -> Option<String> {
    file_name
        .rfind('.')
        .filter(|&idx| idx > 0 && idx + 1 < file_name.len())
        .map(|idx| file_name[idx..].to_string())
}
