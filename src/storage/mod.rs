// src/storage/mod.rs
use crate::models::{AuditTrail, ExtractionResult};
use crate::utils::error::StorageError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        // Create the base directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    /// Saves the validated extraction as JSON under the document directory
    pub fn save_validated(&self, result: &ExtractionResult) -> Result<PathBuf, StorageError> {
        let target_dir = self.document_dir(&result.document_id)?;
        let file_path = target_dir.join("validated.json");

        let body = serde_json::to_string_pretty(result)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, body).map_err(StorageError::IoError)?;

        tracing::info!("Saved validated extraction to {}", file_path.display());
        Ok(file_path)
    }

    /// Saves the audit trail plus a summary of what was applied and skipped
    pub fn save_audit_report(
        &self,
        document_id: &str,
        trail: &AuditTrail,
    ) -> Result<PathBuf, StorageError> {
        let target_dir = self.document_dir(document_id)?;
        let file_path = target_dir.join("audit_report.json");

        let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for record in &trail.records {
            *by_kind.entry(record.kind.as_str()).or_insert(0) += 1;
        }

        let report = serde_json::json!({
            "document_id": document_id,
            "summary": {
                "total_considered": trail.records.len(),
                "total_applied": trail.applied_count(),
                "total_skipped": trail.skipped_count(),
                "by_kind": by_kind,
            },
            "records": trail.records,
            "corrections": trail.corrections,
            "report_timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let body = serde_json::to_string_pretty(&report)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, body).map_err(StorageError::IoError)?;

        tracing::info!("Saved audit report to {}", file_path.display());
        Ok(file_path)
    }

    fn document_dir(&self, document_id: &str) -> Result<PathBuf, StorageError> {
        let target_dir = self.base_dir.join(document_id);
        if !target_dir.exists() {
            fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        }
        Ok(target_dir)
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AuditRecord, DiscrepancyKind, ExtractionMethod,
    };

    fn temp_base(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spec_validator_storage_{}_{}", tag, std::process::id()))
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let base = temp_base("roundtrip");
        let storage = StorageManager::new(&base).unwrap();

        let result = ExtractionResult::new(ExtractionMethod::Primary, "doc-1");
        let mut trail = AuditTrail::default();
        trail.records.push(AuditRecord {
            block_index: Some(0),
            kind: DiscrepancyKind::MismatchedNumber,
            confidence: 0.64,
            applied: false,
            before: Some("26-05-29".to_string()),
            after: Some("26-05-28".to_string()),
            justification: "skipped: low confidence (0.64 < 0.70)".to_string(),
        });

        let validated_path = storage.save_validated(&result).unwrap();
        let report_path = storage.save_audit_report("doc-1", &trail).unwrap();

        let reloaded: ExtractionResult =
            serde_json::from_str(&fs::read_to_string(&validated_path).unwrap()).unwrap();
        assert_eq!(reloaded.document_id, "doc-1");

        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(report["summary"]["total_considered"], 1);
        assert_eq!(report["summary"]["total_applied"], 0);
        assert_eq!(report["summary"]["by_kind"]["mismatched_number"], 1);
        assert_eq!(report["records"][0]["applied"], false);

        fs::remove_dir_all(&base).ok();
    }
}
