// src/reconcile/applier.rs

// --- Imports ---
use crate::models::{
    AuditRecord, AuditTrail, Correction, Discrepancy, DiscrepancyKind, ExtractionResult,
    FormatFamily, Mutation,
};

/// Default confidence cutoff for accepting a correction.
pub const DEFAULT_THRESHOLD: f64 = 0.70;

/// Applies accepted corrections to the primary extraction, in document
/// order, and records every discrepancy considered in the audit trail.
///
/// Scoring lives in the engine; this is where the accept/reject policy sits,
/// so the two stay independently testable.
pub struct CorrectionApplier {
    threshold: f64,
}

impl CorrectionApplier {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Consumes the primary extraction and returns the validated result plus
    /// the audit trail. Below-threshold discrepancies never mutate data;
    /// unrelated blocks are never reordered.
    pub fn apply(
        &self,
        primary: ExtractionResult,
        discrepancies: &[Discrepancy],
    ) -> (ExtractionResult, AuditTrail) {
        let mut blocks = primary.blocks;
        let mut trail = AuditTrail::default();
        // Positions of applied insertions and removals, in original primary
        // coordinates, so every later mutation resolves against the indices
        // the engine emitted.
        let mut shifter = IndexShifter::default();

        for d in discrepancies {
            if d.kind == DiscrepancyKind::Structural {
                trail.records.push(AuditRecord {
                    block_index: d.primary_index,
                    kind: d.kind,
                    confidence: d.confidence,
                    applied: false,
                    before: d.before.clone(),
                    after: None,
                    justification: format!("structural: {}; requires human review", d.detail),
                });
                continue;
            }

            if d.confidence < self.threshold {
                trail.records.push(AuditRecord {
                    block_index: d.primary_index.or(d.insert_after),
                    kind: d.kind,
                    confidence: d.confidence,
                    applied: false,
                    before: d.before.clone(),
                    after: d.proposed_number.clone(),
                    justification: format!(
                        "skipped: low confidence ({:.2} < {:.2})",
                        d.confidence, self.threshold
                    ),
                });
                continue;
            }

            match self.mutate(&mut blocks, d, &mut shifter) {
                Some(correction) => {
                    let (before, after) = mutation_values(&correction.mutation);
                    trail.records.push(AuditRecord {
                        block_index: d.primary_index.or(d.insert_after),
                        kind: d.kind,
                        confidence: d.confidence,
                        applied: true,
                        before,
                        after,
                        justification: correction.justification.clone(),
                    });
                    trail.corrections.push(correction);
                }
                None => {
                    trail.records.push(AuditRecord {
                        block_index: d.primary_index.or(d.insert_after),
                        kind: d.kind,
                        confidence: d.confidence,
                        applied: false,
                        before: d.before.clone(),
                        after: d.proposed_number.clone(),
                        justification: "skipped: mutation target unavailable".to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Applied {} corrections, skipped {} discrepancies for document '{}'",
            trail.applied_count(),
            trail.skipped_count(),
            primary.document_id
        );

        (
            ExtractionResult {
                method: primary.method,
                document_id: primary.document_id,
                blocks,
            },
            trail,
        )
    }

    /// Performs exactly one mutation for an accepted discrepancy.
    fn mutate(
        &self,
        blocks: &mut Vec<crate::models::ContentBlock>,
        d: &Discrepancy,
        shifter: &mut IndexShifter,
    ) -> Option<Correction> {
        match d.kind {
            DiscrepancyKind::MissingNumber | DiscrepancyKind::MismatchedNumber => {
                let idx = shifter.block_index(d.primary_index?, blocks.len())?;
                let after = d.proposed_number.clone()?;
                let before = std::mem::replace(&mut blocks[idx].number, after.clone());
                blocks[idx].format_family =
                    d.proposed_family.or_else(|| FormatFamily::detect(&after));
                Some(Correction {
                    kind: d.kind,
                    justification: self.accepted(d, &before, &after),
                    mutation: Mutation::ReplaceNumber { before, after },
                })
            }
            DiscrepancyKind::LevelMismatch => {
                let idx = shifter.block_index(d.primary_index?, blocks.len())?;
                let after = d.proposed_level?;
                let before = std::mem::replace(&mut blocks[idx].level, after);
                Some(Correction {
                    kind: d.kind,
                    justification: self.accepted(d, &before.to_string(), &after.to_string()),
                    mutation: Mutation::AdjustLevel { before, after },
                })
            }
            DiscrepancyKind::ExtraBlock => {
                let mut block = d.proposed_block.clone()?;
                let pos = shifter.insert_position(d.insert_after, blocks.len());
                // Keep the level invariant intact at the insertion point.
                if pos > 0 {
                    block.level = block.level.min(blocks[pos - 1].level + 1);
                }
                let number = block.number.clone();
                blocks.insert(pos, block);
                shifter.record_insert(d.insert_after);
                Some(Correction {
                    kind: d.kind,
                    justification: self.accepted(d, "", &number),
                    mutation: Mutation::InsertBlock { number },
                })
            }
            DiscrepancyKind::MissingBlock => {
                let original = d.primary_index?;
                let idx = shifter.block_index(original, blocks.len())?;
                let removed = blocks.remove(idx);
                shifter.record_drop(original);
                Some(Correction {
                    kind: d.kind,
                    justification: self.accepted(d, &removed.number, ""),
                    mutation: Mutation::DropBlock {
                        number: removed.number,
                    },
                })
            }
            DiscrepancyKind::Structural => None,
        }
    }

    fn accepted(&self, d: &Discrepancy, before: &str, after: &str) -> String {
        format!(
            "{}: '{}' -> '{}' (confidence {:.2} >= threshold {:.2})",
            d.kind.as_str(),
            before,
            after,
            d.confidence,
            self.threshold
        )
    }
}

/// Maps original primary indices to current positions after insertions and
/// removals. A mutation shifts an index only when it landed at a strictly
/// earlier position, so same-position drops and inserts never displace an
/// unrelated neighbor.
#[derive(Default)]
struct IndexShifter {
    dropped: Vec<usize>,
    // Insertion slots in original coordinates: anchor index + 1.
    inserted_slots: Vec<usize>,
}

impl IndexShifter {
    /// Current index of the block originally at `original`, or None if it
    /// was dropped or falls outside the sequence.
    fn block_index(&self, original: usize, len: usize) -> Option<usize> {
        if self.dropped.contains(&original) {
            return None;
        }
        let inserted_before = self
            .inserted_slots
            .iter()
            .filter(|&&slot| slot <= original)
            .count();
        let dropped_before = self.dropped.iter().filter(|&&d| d < original).count();
        let idx = original + inserted_before - dropped_before;
        (idx < len).then_some(idx)
    }

    /// Current insertion position for the slot after `anchor` (the front of
    /// the sequence when there is no anchor). Earlier insertions at the same
    /// slot keep their relative order.
    fn insert_position(&self, anchor: Option<usize>, len: usize) -> usize {
        let slot = anchor.map(|a| a + 1).unwrap_or(0);
        let inserted_before = self
            .inserted_slots
            .iter()
            .filter(|&&s| s <= slot)
            .count();
        let dropped_before = self.dropped.iter().filter(|&&d| d < slot).count();
        (slot + inserted_before - dropped_before).min(len)
    }

    fn record_drop(&mut self, original: usize) {
        self.dropped.push(original);
    }

    fn record_insert(&mut self, anchor: Option<usize>) {
        self.inserted_slots.push(anchor.map(|a| a + 1).unwrap_or(0));
    }
}

fn mutation_values(mutation: &Mutation) -> (Option<String>, Option<String>) {
    match mutation {
        Mutation::ReplaceNumber { before, after } => {
            (Some(before.clone()), Some(after.clone()))
        }
        Mutation::AdjustLevel { before, after } => {
            (Some(before.to_string()), Some(after.to_string()))
        }
        Mutation::InsertBlock { number } => (None, Some(number.clone())),
        Mutation::DropBlock { number } => (Some(number.clone()), None),
    }
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::pattern::TemplateHint;
    use crate::models::{ContentBlock, ExtractionMethod};
    use crate::reconcile::engine::{EngineConfig, ReconciliationEngine};

    fn primary_block(level: usize, number: &str, text: &str) -> ContentBlock {
        ContentBlock {
            level,
            number: number.to_string(),
            format_family: FormatFamily::detect(number),
            text: text.to_string(),
            source_line_range: (0, 0),
            origin: ExtractionMethod::Primary,
            detection_confidence: 1.0,
        }
    }

    fn secondary_block(level: usize, number: &str, text: &str) -> ContentBlock {
        ContentBlock {
            level,
            number: number.to_string(),
            format_family: FormatFamily::detect(number),
            text: text.to_string(),
            source_line_range: (0, 0),
            origin: ExtractionMethod::Secondary,
            detection_confidence: 0.65,
        }
    }

    fn result(method: ExtractionMethod, blocks: Vec<ContentBlock>) -> ExtractionResult {
        ExtractionResult {
            method,
            document_id: "doc-1".to_string(),
            blocks,
        }
    }

    #[test]
    fn test_incomplete_number_corrected_with_hint() {
        // Scenario: "26.05" completed to "26.05.00" under a matching hint.
        let primary = result(
            ExtractionMethod::Primary,
            vec![primary_block(2, "26.05", "Pumps")],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![secondary_block(3, "26.05.00", "Pumps")],
        );
        let engine =
            ReconciliationEngine::new(EngineConfig::default(), TemplateHint::parse("26.05.00"));
        let discrepancies = engine.reconcile(&primary, &secondary);

        let (validated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(primary, &discrepancies);

        assert_eq!(validated.blocks[0].number, "26.05.00");
        assert_eq!(validated.blocks[0].level, 3, "level follows the corrected number");
        let record = trail
            .records
            .iter()
            .find(|r| r.kind == DiscrepancyKind::MissingNumber)
            .unwrap();
        assert!(record.applied);
        assert_eq!(record.before.as_deref(), Some("26.05"));
        assert_eq!(record.after.as_deref(), Some("26.05.00"));
    }

    #[test]
    fn test_low_confidence_mismatch_is_skipped() {
        // Scenario: one-digit OCR disagreement with no template hint.
        let primary = result(
            ExtractionMethod::Primary,
            vec![primary_block(3, "26-05-29", "Conductors")],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![secondary_block(3, "26-05-28", "Conductors")],
        );
        let engine = ReconciliationEngine::new(EngineConfig::default(), None);
        let discrepancies = engine.reconcile(&primary, &secondary);

        let (validated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(primary, &discrepancies);

        assert_eq!(validated.blocks[0].number, "26-05-29", "primary untouched");
        assert_eq!(trail.records.len(), 1);
        assert!(!trail.records[0].applied);
        assert!(trail.records[0].justification.starts_with("skipped: low confidence"));
        assert!(trail.corrections.is_empty());
    }

    #[test]
    fn test_threshold_monotonicity() {
        let primary = result(
            ExtractionMethod::Primary,
            vec![
                primary_block(2, "26.05", "Pumps"),
                primary_block(3, "26-05-29", "Conductors"),
            ],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![
                secondary_block(3, "26.05.00", "Pumps"),
                secondary_block(3, "26-05-28", "Conductors"),
            ],
        );
        let engine =
            ReconciliationEngine::new(EngineConfig::default(), TemplateHint::parse("26.05.00"));
        let discrepancies = engine.reconcile(&primary, &secondary);

        let mut previous = usize::MAX;
        for threshold in [0.1, 0.5, 0.7, 0.95] {
            let (_, trail) =
                CorrectionApplier::new(threshold).apply(primary.clone(), &discrepancies);
            assert!(
                trail.applied_count() <= previous,
                "applied count must not grow as the threshold rises"
            );
            previous = trail.applied_count();
        }
    }

    #[test]
    fn test_extra_block_inserted_in_order() {
        // Scenario: secondary has "26.05.01 Valves" with no primary
        // counterpart; a matching hint pushes it over the threshold.
        let primary = result(
            ExtractionMethod::Primary,
            vec![
                primary_block(3, "26.05.00", "Pumps"),
                primary_block(3, "26.05.02", "Meters"),
            ],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![
                secondary_block(3, "26.05.00", "Pumps"),
                secondary_block(3, "26.05.01", "Valves"),
                secondary_block(3, "26.05.02", "Meters"),
            ],
        );
        let engine =
            ReconciliationEngine::new(EngineConfig::default(), TemplateHint::parse("26.05.00"));
        let discrepancies = engine.reconcile(&primary, &secondary);

        let (validated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(primary.clone(), &discrepancies);
        let numbers: Vec<&str> = validated.blocks.iter().map(|b| b.number.as_str()).collect();
        assert_eq!(numbers, vec!["26.05.00", "26.05.01", "26.05.02"]);
        assert_eq!(trail.applied_count(), 1);

        // Without the hint the insertion stays below threshold: logged, not
        // applied.
        let engine = ReconciliationEngine::new(EngineConfig::default(), None);
        let discrepancies = engine.reconcile(&primary, &secondary);
        let (validated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(primary, &discrepancies);
        assert_eq!(validated.blocks.len(), 2);
        let record = trail
            .records
            .iter()
            .find(|r| r.kind == DiscrepancyKind::ExtraBlock)
            .unwrap();
        assert!(!record.applied);
    }

    #[test]
    fn test_structural_never_applied_even_at_zero_threshold() {
        let primary = result(
            ExtractionMethod::Primary,
            vec![
                primary_block(1, "26.05", "Common Work"),
                primary_block(4, "26.05.00.01.02", "Deep"),
            ],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![
                secondary_block(1, "26.05", "Common Work"),
                secondary_block(4, "26.05.00.01.02", "Deep"),
            ],
        );
        let engine = ReconciliationEngine::new(EngineConfig::default(), None);
        let discrepancies = engine.reconcile(&primary, &secondary);
        assert!(!discrepancies.is_empty());

        let (validated, trail) = CorrectionApplier::new(0.0).apply(primary.clone(), &discrepancies);
        assert_eq!(validated.blocks[1].level, 4, "structural findings never mutate");
        let record = trail
            .records
            .iter()
            .find(|r| r.kind == DiscrepancyKind::Structural)
            .unwrap();
        assert!(!record.applied);
        assert!(record.justification.contains("requires human review"));
    }

    #[test]
    fn test_drop_and_insert_offsets_stay_consistent() {
        // Lowered threshold accepts a drop and an insert in one pass; later
        // indices must stay valid through both.
        let primary = result(
            ExtractionMethod::Primary,
            vec![
                primary_block(3, "99.99.99", "Phantom"),
                primary_block(3, "26.05.00", "Pumps"),
                primary_block(3, "26.05.03", "Meters"),
            ],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![
                secondary_block(3, "26.05.00", "Pumps"),
                secondary_block(3, "26.05.01", "Valves"),
                secondary_block(3, "26.05.03", "Meters"),
            ],
        );
        let engine = ReconciliationEngine::new(EngineConfig::default(), None);
        let discrepancies = engine.reconcile(&primary, &secondary);

        let (validated, _) = CorrectionApplier::new(0.3).apply(primary, &discrepancies);
        let numbers: Vec<&str> = validated.blocks.iter().map(|b| b.number.as_str()).collect();
        assert_eq!(numbers, vec!["26.05.00", "26.05.01", "26.05.03"]);
    }

    #[test]
    fn test_drop_and_insert_at_same_position_keep_neighbor_order() {
        // A drop at index 1 and an insert anchored after index 0 land at the
        // same position; the insert must not slide ahead of the untouched
        // first block.
        let primary = result(
            ExtractionMethod::Primary,
            vec![
                primary_block(3, "26.05.00", "Pumps"),
                primary_block(3, "99.99.99", "Phantom"),
            ],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![
                secondary_block(3, "26.05.00", "Pumps"),
                secondary_block(3, "26.05.01", "Valves"),
            ],
        );
        let engine = ReconciliationEngine::new(EngineConfig::default(), None);
        let discrepancies = engine.reconcile(&primary, &secondary);

        let (validated, trail) = CorrectionApplier::new(0.3).apply(primary, &discrepancies);
        let numbers: Vec<&str> = validated.blocks.iter().map(|b| b.number.as_str()).collect();
        assert_eq!(numbers, vec!["26.05.00", "26.05.01"]);
        assert_eq!(trail.applied_count(), 2);
    }

    #[test]
    fn test_idempotent_after_application() {
        let primary = result(
            ExtractionMethod::Primary,
            vec![primary_block(2, "26.05", "Pumps")],
        );
        let secondary = result(
            ExtractionMethod::Secondary,
            vec![secondary_block(3, "26.05.00", "Pumps")],
        );
        let engine =
            ReconciliationEngine::new(EngineConfig::default(), TemplateHint::parse("26.05.00"));
        let discrepancies = engine.reconcile(&primary, &secondary);
        let (validated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(primary, &discrepancies);
        assert!(trail.applied_count() > 0);

        // Second pass over the corrected result: nothing further to accept.
        let discrepancies = engine.reconcile(&validated, &secondary);
        let (revalidated, trail) =
            CorrectionApplier::new(DEFAULT_THRESHOLD).apply(validated.clone(), &discrepancies);
        assert_eq!(trail.applied_count(), 0);
        assert_eq!(revalidated.blocks.len(), validated.blocks.len());
        assert_eq!(revalidated.blocks[0].number, validated.blocks[0].number);
    }
}
