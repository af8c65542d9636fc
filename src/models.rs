// src/models.rs
use serde::{Deserialize, Serialize};

/// A recognized style of hierarchical numbering tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatFamily {
    /// "26.05.00"
    Dotted,
    /// "26-05-29"
    Dashed,
    /// "26 05 00" (common in SECTION headings)
    Spaced,
}

impl FormatFamily {
    /// Infers the family from the separators present in a raw number string.
    /// Bare digits ("26") carry no family information.
    pub fn detect(number: &str) -> Option<FormatFamily> {
        let trimmed = number.trim();
        if trimmed.contains('.') {
            Some(FormatFamily::Dotted)
        } else if trimmed.contains('-') {
            Some(FormatFamily::Dashed)
        } else if trimmed.contains(' ') {
            Some(FormatFamily::Spaced)
        } else {
            None
        }
    }
}

/// Which extraction pipeline produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Primary,
    Secondary,
}

/// One structural unit of extracted document content.
///
/// Blocks are kept in document order; insertion order is the ordering key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Integer depth, 0 = root.
    pub level: usize,
    /// Normalized numbering string, empty if undetected.
    pub number: String,
    pub format_family: Option<FormatFamily>,
    /// Body content (heading title plus any continuation lines).
    pub text: String,
    /// Ordered pair of line indices in the originating text stream.
    pub source_line_range: (usize, usize),
    pub origin: ExtractionMethod,
    /// Local pattern-match confidence at detection time (1.0 for primary).
    pub detection_confidence: f64,
}

/// Ordered sequence of content blocks from one extraction method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub method: ExtractionMethod,
    pub document_id: String,
    pub blocks: Vec<ContentBlock>,
}

impl ExtractionResult {
    pub fn new(method: ExtractionMethod, document_id: &str) -> Self {
        Self {
            method,
            document_id: document_id.to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Classification of a disagreement between the two extractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Primary number empty or an incomplete prefix of the secondary number.
    MissingNumber,
    /// Both sides carry a number and they disagree.
    MismatchedNumber,
    /// Present in primary, absent in secondary.
    MissingBlock,
    /// Present in secondary, absent in primary.
    ExtraBlock,
    LevelMismatch,
    /// Invariant violation or sequence anomaly; confidence 0, never applied.
    Structural,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::MissingNumber => "missing_number",
            DiscrepancyKind::MismatchedNumber => "mismatched_number",
            DiscrepancyKind::MissingBlock => "missing_block",
            DiscrepancyKind::ExtraBlock => "extra_block",
            DiscrepancyKind::LevelMismatch => "level_mismatch",
            DiscrepancyKind::Structural => "structural",
        }
    }
}

/// Named scoring inputs so the confidence formula stays auditable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub local_match_confidence: f64,
    pub template_agreement: f64,
    pub level_ambiguity_penalty: f64,
}

impl ConfidenceFactors {
    /// Deterministic combination, clamped to [0, 1].
    pub fn combined(&self) -> f64 {
        (self.local_match_confidence + self.template_agreement - self.level_ambiguity_penalty)
            .clamp(0.0, 1.0)
    }
}

/// A detected disagreement plus the mutation data needed to resolve it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    /// Index into the primary block sequence, if one side of the pair exists there.
    pub primary_index: Option<usize>,
    /// Index into the secondary block sequence.
    pub secondary_index: Option<usize>,
    /// For extra_block: primary index after which the insertion belongs.
    pub insert_after: Option<usize>,
    pub before: Option<String>,
    pub proposed_number: Option<String>,
    pub proposed_family: Option<FormatFamily>,
    pub proposed_level: Option<usize>,
    /// Full block payload for extra_block insertions.
    pub proposed_block: Option<ContentBlock>,
    pub confidence: f64,
    pub factors: ConfidenceFactors,
    /// Free-form context carried into the audit justification.
    pub detail: String,
}

/// The mutation an accepted discrepancy performs on the primary extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum Mutation {
    ReplaceNumber { before: String, after: String },
    AdjustLevel { before: usize, after: usize },
    InsertBlock { number: String },
    DropBlock { number: String },
}

/// An accepted discrepancy paired with its applied mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correction {
    pub kind: DiscrepancyKind,
    pub mutation: Mutation,
    pub justification: String,
}

/// One entry in the audit trail: every discrepancy considered, applied or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub block_index: Option<usize>,
    pub kind: DiscrepancyKind,
    pub confidence: f64,
    pub applied: bool,
    pub before: Option<String>,
    pub after: Option<String>,
    pub justification: String,
}

/// Complete, ordered record of a reconciliation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditTrail {
    pub records: Vec<AuditRecord>,
    pub corrections: Vec<Correction>,
}

impl AuditTrail {
    pub fn applied_count(&self) -> usize {
        self.records.iter().filter(|r| r.applied).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.records.iter().filter(|r| !r.applied).count()
    }
}

// --- Number comparison helpers ---
// Numbers compare by parsed digit segments, so "26.05" and "26 05" are the
// same number rendered in different families.

/// Splits a number string into numeric segments. Returns None when the
/// string is empty or contains non-numeric segments.
pub fn number_segments(number: &str) -> Option<Vec<u32>> {
    let trimmed = number.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    let segments: Option<Vec<u32>> = trimmed
        .split(['.', '-', ' '])
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().ok())
        .collect();
    segments.filter(|v| !v.is_empty())
}

pub fn numbers_equal(a: &str, b: &str) -> bool {
    match (number_segments(a), number_segments(b)) {
        (Some(sa), Some(sb)) => sa == sb,
        _ => false,
    }
}

/// True when `a` is a strict segment-prefix of `b` ("26.05" vs "26.05.00").
pub fn is_segment_prefix(a: &str, b: &str) -> bool {
    match (number_segments(a), number_segments(b)) {
        (Some(sa), Some(sb)) => sa.len() < sb.len() && sb[..sa.len()] == sa[..],
        _ => false,
    }
}

/// True when both numbers share family depth and differ by exactly one in
/// the last segment ("26.05.01" next to "26.05.02").
pub fn numerically_adjacent(a: &str, b: &str) -> bool {
    match (number_segments(a), number_segments(b)) {
        (Some(sa), Some(sb)) => {
            sa.len() == sb.len()
                && !sa.is_empty()
                && sa[..sa.len() - 1] == sb[..sb.len() - 1]
                && sa[sa.len() - 1].abs_diff(sb[sb.len() - 1]) == 1
        }
        _ => false,
    }
}

/// Levenshtein distance over the digit characters only, so "26-05-29" vs
/// "26.05.28" measures the digits and ignores separator style.
pub fn digit_edit_distance(a: &str, b: &str) -> usize {
    let da: Vec<char> = a.chars().filter(|c| c.is_ascii_digit()).collect();
    let db: Vec<char> = b.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut prev: Vec<usize> = (0..=db.len()).collect();
    let mut curr = vec![0usize; db.len() + 1];
    for (i, ca) in da.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in db.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[db.len()]
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_segments() {
        assert_eq!(number_segments("26.05.00"), Some(vec![26, 5, 0]));
        assert_eq!(number_segments("26-05-29"), Some(vec![26, 5, 29]));
        assert_eq!(number_segments("26 05 00"), Some(vec![26, 5, 0]));
        assert_eq!(number_segments("2."), Some(vec![2]));
        assert_eq!(number_segments(""), None);
        assert_eq!(number_segments("A.1"), None, "letter segments are not numeric");
    }

    #[test]
    fn test_numbers_equal_across_families() {
        assert!(numbers_equal("26.05", "26 05"));
        assert!(numbers_equal("26-05-29", "26.05.29"));
        assert!(!numbers_equal("26.05", "26.06"));
        assert!(!numbers_equal("", "26.05"));
    }

    #[test]
    fn test_segment_prefix() {
        assert!(is_segment_prefix("26.05", "26.05.00"));
        assert!(!is_segment_prefix("26.05.00", "26.05"), "prefix is strict and directional");
        assert!(!is_segment_prefix("26.05", "26.05"));
        assert!(!is_segment_prefix("26.06", "26.05.00"));
    }

    #[test]
    fn test_numerically_adjacent() {
        assert!(numerically_adjacent("26-05-28", "26-05-29"));
        assert!(numerically_adjacent("26.05.02", "26.05.01"));
        assert!(!numerically_adjacent("26.05.01", "26.05.03"));
        assert!(!numerically_adjacent("26.05", "26.05.01"));
    }

    #[test]
    fn test_digit_edit_distance() {
        assert_eq!(digit_edit_distance("26-05-29", "26-05-28"), 1);
        assert_eq!(digit_edit_distance("26.05.00", "26 05 00"), 0);
        assert_eq!(digit_edit_distance("26.05", "26.05.00"), 2);
        assert_eq!(digit_edit_distance("", "123"), 3);
    }

    #[test]
    fn test_confidence_factors_clamped() {
        let f = ConfidenceFactors {
            local_match_confidence: 0.9,
            template_agreement: 0.25,
            level_ambiguity_penalty: 0.0,
        };
        assert_eq!(f.combined(), 1.0);

        let g = ConfidenceFactors {
            local_match_confidence: 0.1,
            template_agreement: 0.0,
            level_ambiguity_penalty: 0.5,
        };
        assert_eq!(g.combined(), 0.0);
    }

    #[test]
    fn test_family_detect() {
        assert_eq!(FormatFamily::detect("26.05.00"), Some(FormatFamily::Dotted));
        assert_eq!(FormatFamily::detect("26-05"), Some(FormatFamily::Dashed));
        assert_eq!(FormatFamily::detect("26 05 00"), Some(FormatFamily::Spaced));
        assert_eq!(FormatFamily::detect("26"), None);
    }
}
