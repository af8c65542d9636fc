// src/extractors/primary.rs

// --- Imports ---
use crate::models::{ContentBlock, ExtractionMethod, ExtractionResult, FormatFamily};
use crate::utils::error::ReconcileError;
use serde::{Deserialize, Serialize};

// Levels beyond this cannot come from any sane numbering scheme; treat the
// input as corrupted rather than trying to reconcile it.
const MAX_SANE_LEVEL: usize = 16;

/// One structural unit as emitted by the native document parser.
/// This is the upstream output contract, consumed as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrimaryUnit {
    pub text: String,
    #[serde(default)]
    pub level: usize,
    #[serde(default)]
    pub number: Option<String>,
}

/// Normalizes native-parser units into the common extraction model.
pub struct PrimaryAdapter;

impl PrimaryAdapter {
    /// Produces the primary `ExtractionResult` in document order.
    ///
    /// Hard-fails only on input that cannot be sequenced at all; a missing
    /// or odd number string is left for reconciliation to sort out.
    pub fn normalize(
        units: &[PrimaryUnit],
        document_id: &str,
    ) -> Result<ExtractionResult, ReconcileError> {
        let mut result = ExtractionResult::new(ExtractionMethod::Primary, document_id);

        for (index, unit) in units.iter().enumerate() {
            if unit.level > MAX_SANE_LEVEL {
                return Err(ReconcileError::CorruptedInput(format!(
                    "unit {} has level {} (max sane level is {})",
                    index, unit.level, MAX_SANE_LEVEL
                )));
            }

            let number = normalize_number(unit.number.as_deref().unwrap_or(""));
            let format_family = FormatFamily::detect(&number);

            result.blocks.push(ContentBlock {
                level: unit.level,
                number,
                format_family,
                text: unit.text.trim().to_string(),
                source_line_range: (index, index),
                origin: ExtractionMethod::Primary,
                detection_confidence: 1.0,
            });
        }

        tracing::debug!(
            "Normalized {} primary units for document '{}'",
            result.blocks.len(),
            document_id
        );
        Ok(result)
    }
}

/// Trims the raw number string and strips dangling separators so "26.05."
/// and "26.05" compare equal downstream.
fn normalize_number(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches(['.', '-']);
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

// --- Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_units() {
        let units = vec![
            PrimaryUnit {
                text: "  Pumps ".to_string(),
                level: 2,
                number: Some("26.05.".to_string()),
            },
            PrimaryUnit {
                text: "General".to_string(),
                level: 1,
                number: None,
            },
        ];

        let result = PrimaryAdapter::normalize(&units, "doc-1").unwrap();
        assert_eq!(result.method, ExtractionMethod::Primary);
        assert_eq!(result.blocks.len(), 2);
        assert_eq!(result.blocks[0].number, "26.05");
        assert_eq!(result.blocks[0].format_family, Some(FormatFamily::Dotted));
        assert_eq!(result.blocks[0].text, "Pumps");
        assert_eq!(result.blocks[0].source_line_range, (0, 0));
        assert_eq!(result.blocks[1].number, "");
        assert_eq!(result.blocks[1].format_family, None);
    }

    #[test]
    fn test_empty_input_is_legal() {
        let result = PrimaryAdapter::normalize(&[], "doc-1").unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_insane_level_is_corrupted_input() {
        let units = vec![PrimaryUnit {
            text: "x".to_string(),
            level: 99,
            number: None,
        }];
        let err = PrimaryAdapter::normalize(&units, "doc-1").unwrap_err();
        assert!(matches!(err, ReconcileError::CorruptedInput(_)));
    }

    #[test]
    fn test_spaced_number_whitespace_collapsed() {
        let units = vec![PrimaryUnit {
            text: "Electrical".to_string(),
            level: 1,
            number: Some("26  05  00".to_string()),
        }];
        let result = PrimaryAdapter::normalize(&units, "doc-1").unwrap();
        assert_eq!(result.blocks[0].number, "26 05 00");
        assert_eq!(result.blocks[0].format_family, Some(FormatFamily::Spaced));
    }
}
