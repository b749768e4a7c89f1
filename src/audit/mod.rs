//! Structured audit logging.
//!
//! Detection and quarantine operations are emitted as structured
//! `tracing` events under the `tempsentry::audit` target so any
//! subscriber (JSON file, journal, test collector) can capture a
//! complete activity trail without the core knowing about sinks.

use crate::core::ScanRecord;
use crate::quarantine::QuarantineItem;

use std::path::Path;

/// Emits an audit event for a classified threat.
pub fn emit_threat_detected(record: &ScanRecord, handled_automatically: bool) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "threat_detected",
        path = %record.path.display(),
        level = %record.level,
        reason = %record.reason,
        size = record.size,
        content_hash = ?record.content_hash,
        handled_automatically,
        "Threat detected"
    );
}

/// Emits an audit event for a file entering quarantine.
pub fn emit_quarantined(item: &QuarantineItem) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "quarantined",
        quarantine_id = %item.id,
        original_path = %item.original_path.display(),
        level = %item.scan_record.level,
        reason = %item.scan_record.reason,
        "File quarantined"
    );
}

/// Emits an audit event for a quarantined file being restored.
pub fn emit_restored(item: &QuarantineItem) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "restored",
        quarantine_id = %item.id,
        original_path = %item.original_path.display(),
        "File restored from quarantine"
    );
}

/// Emits an audit event for an expired item being purged.
pub fn emit_purged(item: &QuarantineItem) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "purged",
        quarantine_id = %item.id,
        original_path = %item.original_path.display(),
        quarantined_at = %item.quarantined_at,
        "Expired quarantine item purged"
    );
}

/// Emits an audit event for an unconditional secure deletion.
pub fn emit_secure_delete(path: &Path) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "secure_delete",
        path = %path.display(),
        "File securely deleted"
    );
}

/// Emits an audit event for a completed background scan pass.
pub fn emit_scan_pass(scanned_dirs: usize, detections: usize) {
    tracing::info!(
        target: "tempsentry::audit",
        event_type = "scan_pass",
        scanned_dirs,
        detections,
        "Background scan pass completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ThreatLevel;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("tempsentry=trace")
            .try_init();
    }

    #[test]
    fn test_emission_with_subscriber_installed() {
        init_tracing();

        let record = ScanRecord::new("/tmp/mimikatz.exe", 42, ThreatLevel::Critical, "known hacker tool 'mimikatz'");
        emit_threat_detected(&record, true);

        let item = QuarantineItem::new("/tmp/tool.exe", record.clone(), "/vault/x.qdata");
        emit_quarantined(&item);
        emit_restored(&item);
        emit_purged(&item);
        emit_secure_delete(Path::new("/tmp/mimikatz.exe"));
        emit_scan_pass(2, 1);
    }
}
