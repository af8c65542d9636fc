// src/reconcile/engine.rs

// --- Imports ---
use crate::matcher::pattern::TemplateHint;
use crate::models::{
    digit_edit_distance, is_segment_prefix, number_segments, numbers_equal, numerically_adjacent,
    ConfidenceFactors, ContentBlock, Discrepancy, DiscrepancyKind, ExtractionResult, FormatFamily,
};

// --- Constants ---
// Scoring inputs. Tunable defaults, not fixed semantics.
const TEMPLATE_EXACT_BONUS: f64 = 0.25;
const TEMPLATE_FAMILY_BONUS: f64 = 0.10;
const AMBIGUITY_PENALTY_DEPTH_1: f64 = 0.20;
const AMBIGUITY_PENALTY_DEPTH_2: f64 = 0.05;
// Dropping a primary block has no positive secondary evidence behind it, so
// it starts from a low base and stays below any sane threshold.
const MISSING_BLOCK_LOCAL_CONFIDENCE: f64 = 0.35;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on how far ahead in the secondary sequence a primary block may
    /// look for its counterpart. Keeps the alignment local and predictable
    /// instead of collapsing into full sequence diffing.
    pub lookahead: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { lookahead: 5 }
    }
}

/// Aligns the two extractions block-by-block, classifies disagreements, and
/// scores each one. Applies no threshold itself; accept/reject policy lives
/// in the Correction Applier.
pub struct ReconciliationEngine {
    config: EngineConfig,
    template: Option<TemplateHint>,
}

impl ReconciliationEngine {
    pub fn new(config: EngineConfig, template: Option<TemplateHint>) -> Self {
        Self { config, template }
    }

    /// Produces the ordered discrepancy sequence for one document run.
    ///
    /// An empty side short-circuits to an empty result: partial upstream
    /// extraction is never an error here.
    pub fn reconcile(
        &self,
        primary: &ExtractionResult,
        secondary: &ExtractionResult,
    ) -> Vec<Discrepancy> {
        if primary.is_empty() || secondary.is_empty() {
            tracing::info!(
                "Empty extraction side for document '{}' (primary: {}, secondary: {}); nothing to reconcile",
                primary.document_id,
                primary.blocks.len(),
                secondary.blocks.len()
            );
            return Vec::new();
        }

        let mut discrepancies = self.structural_scan(primary);

        // Greedy nearest-position matching over a bounded look-ahead window.
        let mut used = vec![false; secondary.blocks.len()];
        let mut pairs: Vec<(usize, usize)> = Vec::new();
        let mut cursor = 0usize;

        for (pi, pblock) in primary.blocks.iter().enumerate() {
            while cursor < used.len() && used[cursor] {
                cursor += 1;
            }
            let window_end = (cursor + self.config.lookahead).min(secondary.blocks.len());
            // Exact number agreement wins over mere closeness, so an adjacent
            // sibling cannot steal a block's true counterpart in the window.
            let found = (cursor..window_end)
                .find(|&j| {
                    !used[j]
                        && !pblock.number.is_empty()
                        && numbers_equal(&pblock.number, &secondary.blocks[j].number)
                })
                .or_else(|| {
                    (cursor..window_end)
                        .find(|&j| !used[j] && blocks_match(pblock, &secondary.blocks[j]))
                });

            match found {
                Some(j) => {
                    used[j] = true;
                    pairs.push((pi, j));
                    self.classify_pair(pi, pblock, j, &secondary.blocks[j], &mut discrepancies);
                }
                None => {
                    tracing::debug!(
                        "Primary block {} ('{}') has no secondary counterpart",
                        pi,
                        pblock.number
                    );
                    discrepancies.push(self.missing_block(pi, pblock));
                }
            }
        }

        for (j, s) in secondary.blocks.iter().enumerate() {
            if !used[j] {
                let anchor = pairs
                    .iter()
                    .filter(|(_, sj)| *sj < j)
                    .map(|(pi, _)| *pi)
                    .max();
                discrepancies.push(self.extra_block(j, s, anchor));
            }
        }

        // Document order: the applier resolves indices mutation by mutation.
        discrepancies.sort_by_key(|d| (anchor_position(d), kind_order(d.kind), d.secondary_index));

        tracing::info!(
            "Reconciled document '{}': {} discrepancies across {} primary / {} secondary blocks",
            primary.document_id,
            discrepancies.len(),
            primary.blocks.len(),
            secondary.blocks.len()
        );
        discrepancies
    }

    /// Flags primary-side invariant violations (level jump > 1) and sibling
    /// sequence gaps. Both surface at confidence 0 for human review only.
    fn structural_scan(&self, primary: &ExtractionResult) -> Vec<Discrepancy> {
        let mut findings = Vec::new();

        for i in 1..primary.blocks.len() {
            let prev = &primary.blocks[i - 1];
            let curr = &primary.blocks[i];

            if curr.level > prev.level + 1 {
                findings.push(structural(
                    i,
                    &curr.number,
                    format!(
                        "level jump from {} to {} exceeds one step",
                        prev.level, curr.level
                    ),
                ));
                continue;
            }

            if let (Some(a), Some(b)) = (number_segments(&prev.number), number_segments(&curr.number)) {
                let siblings = prev.level == curr.level
                    && prev.format_family == curr.format_family
                    && a.len() == b.len()
                    && a[..a.len() - 1] == b[..b.len() - 1];
                if siblings && b[b.len() - 1] > a[a.len() - 1] + 1 {
                    findings.push(structural(
                        i,
                        &curr.number,
                        format!(
                            "sequence gap between '{}' and '{}'",
                            prev.number, curr.number
                        ),
                    ));
                }
            }
        }

        findings
    }

    fn classify_pair(
        &self,
        pi: usize,
        p: &ContentBlock,
        sj: usize,
        s: &ContentBlock,
        out: &mut Vec<Discrepancy>,
    ) {
        if !s.number.is_empty() {
            let incomplete = !p.number.is_empty() && is_segment_prefix(&p.number, &s.number);
            if p.number.is_empty() || incomplete {
                out.push(self.number_discrepancy(DiscrepancyKind::MissingNumber, pi, p, sj, s));
            } else if !numbers_equal(&p.number, &s.number)
                && !is_segment_prefix(&s.number, &p.number)
            {
                // A secondary number that is a mere prefix of the primary one
                // is weaker evidence, not a disagreement.
                out.push(self.number_discrepancy(DiscrepancyKind::MismatchedNumber, pi, p, sj, s));
            }
        }

        if p.level != s.level {
            let factors = self.factors(s.detection_confidence, &s.number);
            out.push(Discrepancy {
                kind: DiscrepancyKind::LevelMismatch,
                primary_index: Some(pi),
                secondary_index: Some(sj),
                insert_after: None,
                before: Some(p.level.to_string()),
                proposed_number: None,
                proposed_family: None,
                proposed_level: Some(s.level),
                proposed_block: None,
                confidence: factors.combined(),
                factors,
                detail: format!(
                    "primary level {} vs secondary level {} for '{}'",
                    p.level, s.level, s.number
                ),
            });
        }
    }

    fn number_discrepancy(
        &self,
        kind: DiscrepancyKind,
        pi: usize,
        p: &ContentBlock,
        sj: usize,
        s: &ContentBlock,
    ) -> Discrepancy {
        let factors = self.factors(s.detection_confidence, &s.number);
        Discrepancy {
            kind,
            primary_index: Some(pi),
            secondary_index: Some(sj),
            insert_after: None,
            before: Some(p.number.clone()),
            proposed_number: Some(s.number.clone()),
            proposed_family: s.format_family,
            proposed_level: None,
            proposed_block: None,
            confidence: factors.combined(),
            factors,
            detail: format!("primary '{}' vs secondary '{}'", p.number, s.number),
        }
    }

    fn missing_block(&self, pi: usize, p: &ContentBlock) -> Discrepancy {
        let mut factors = self.factors(MISSING_BLOCK_LOCAL_CONFIDENCE, &p.number);
        // No secondary evidence exists to confirm anything about this block.
        factors.template_agreement = 0.0;
        Discrepancy {
            kind: DiscrepancyKind::MissingBlock,
            primary_index: Some(pi),
            secondary_index: None,
            insert_after: None,
            before: Some(p.number.clone()),
            proposed_number: None,
            proposed_family: None,
            proposed_level: None,
            proposed_block: None,
            confidence: factors.combined(),
            factors,
            detail: format!("primary block '{}' absent from secondary", p.number),
        }
    }

    fn extra_block(&self, sj: usize, s: &ContentBlock, anchor: Option<usize>) -> Discrepancy {
        let factors = self.factors(s.detection_confidence, &s.number);
        Discrepancy {
            kind: DiscrepancyKind::ExtraBlock,
            primary_index: None,
            secondary_index: Some(sj),
            insert_after: anchor,
            before: None,
            proposed_number: Some(s.number.clone()),
            proposed_family: s.format_family,
            proposed_level: Some(s.level),
            proposed_block: Some(s.clone()),
            confidence: factors.combined(),
            factors,
            detail: format!("secondary block '{}' absent from primary", s.number),
        }
    }

    /// Combines the three named scoring inputs. Deterministic for identical
    /// inputs; no randomness, no wall-clock dependence.
    fn factors(&self, local: f64, proposed_number: &str) -> ConfidenceFactors {
        let depth = number_segments(proposed_number)
            .map(|s| s.len())
            .unwrap_or(0);
        ConfidenceFactors {
            local_match_confidence: local,
            template_agreement: self.template_agreement(proposed_number, depth),
            level_ambiguity_penalty: match depth {
                1 => AMBIGUITY_PENALTY_DEPTH_1,
                2 => AMBIGUITY_PENALTY_DEPTH_2,
                _ => 0.0,
            },
        }
    }

    fn template_agreement(&self, number: &str, depth: usize) -> f64 {
        let Some(hint) = &self.template else {
            return 0.0;
        };
        let Some(family) = FormatFamily::detect(number) else {
            return 0.0;
        };
        if family == hint.family && depth == hint.depth {
            TEMPLATE_EXACT_BONUS
        } else if family == hint.family {
            TEMPLATE_FAMILY_BONUS
        } else {
            0.0
        }
    }
}

fn structural(index: usize, number: &str, detail: String) -> Discrepancy {
    Discrepancy {
        kind: DiscrepancyKind::Structural,
        primary_index: Some(index),
        secondary_index: None,
        insert_after: None,
        before: Some(number.to_string()),
        proposed_number: None,
        proposed_family: None,
        proposed_level: None,
        proposed_block: None,
        confidence: 0.0,
        factors: ConfidenceFactors::default(),
        detail,
    }
}

/// Whether a primary/secondary pair is close enough to align.
fn blocks_match(p: &ContentBlock, s: &ContentBlock) -> bool {
    if !p.number.is_empty() && !s.number.is_empty() {
        numbers_equal(&p.number, &s.number)
            || is_segment_prefix(&p.number, &s.number)
            || is_segment_prefix(&s.number, &p.number)
            || digit_edit_distance(&p.number, &s.number) <= 1
            || (p.format_family == s.format_family
                && p.level == s.level
                && numerically_adjacent(&p.number, &s.number))
    } else {
        texts_similar(&p.text, &s.text)
    }
}

fn texts_similar(a: &str, b: &str) -> bool {
    let na = normalize_text(a);
    let nb = normalize_text(b);
    !na.is_empty() && !nb.is_empty() && (na.starts_with(&nb) || nb.starts_with(&na))
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn anchor_position(d: &Discrepancy) -> usize {
    match d.primary_index {
        Some(i) => i,
        None => d.insert_after.map(|i| i + 1).unwrap_or(0),
    }
}

fn kind_order(kind: DiscrepancyKind) -> u8 {
    match kind {
        DiscrepancyKind::Structural => 0,
        DiscrepancyKind::MissingNumber
        | DiscrepancyKind::MismatchedNumber
        | DiscrepancyKind::LevelMismatch => 1,
        DiscrepancyKind::MissingBlock => 2,
        DiscrepancyKind::ExtraBlock => 3,
    }
}
