// src/extractors/secondary.rs

// --- Imports ---
use crate::matcher::context::LineContextWindow;
use crate::matcher::pattern::{MatcherConfig, PatternMatcher};
use crate::models::{
    is_segment_prefix, ContentBlock, ExtractionMethod, ExtractionResult,
};
use crate::utils::error::MatchError;
use serde::{Deserialize, Serialize};

/// One raw text line from the OCR/PDF pipeline, optionally carrying the
/// image-to-text confidence reported for that line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecondaryLine {
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl SecondaryLine {
    /// Wraps plain text, one line per entry, with no OCR confidence.
    pub fn from_plain_text(raw: &str) -> Vec<SecondaryLine> {
        raw.lines()
            .map(|l| SecondaryLine {
                text: l.to_string(),
                confidence: None,
            })
            .collect()
    }
}

/// Streams OCR-derived lines through the Pattern Matcher and Line Context
/// Window, producing the secondary side of the common extraction model.
///
/// Single pass, no look-ahead; the window is allocated fresh per document.
pub struct SecondaryAdapter {
    matcher: PatternMatcher,
    window_capacity: usize,
}

impl SecondaryAdapter {
    pub fn new(config: &MatcherConfig, window_capacity: usize) -> Result<Self, MatchError> {
        Ok(Self {
            matcher: PatternMatcher::new(config)?,
            window_capacity,
        })
    }

    pub fn extract(&self, lines: &[SecondaryLine], document_id: &str) -> ExtractionResult {
        let mut result = ExtractionResult::new(ExtractionMethod::Secondary, document_id);
        let mut window = LineContextWindow::new(self.window_capacity);

        for (index, line) in lines.iter().enumerate() {
            let trimmed = line.text.trim();
            if trimmed.is_empty() {
                window.push(&line.text);
                continue;
            }

            match self.matcher.match_line(&line.text, &window) {
                Some(candidate) => {
                    let ocr = line.confidence.unwrap_or(1.0).clamp(0.0, 1.0);
                    let start = if candidate.merged {
                        index.saturating_sub(1)
                    } else {
                        index
                    };
                    let block = ContentBlock {
                        level: candidate.depth,
                        number: candidate.token.clone(),
                        format_family: Some(candidate.family),
                        text: candidate.remainder.clone(),
                        source_line_range: (start, index),
                        origin: ExtractionMethod::Secondary,
                        detection_confidence: candidate.confidence * ocr,
                    };

                    // A merged token means the previous line ended mid-number.
                    // If that line already produced a truncated block for the
                    // same heading, the merge supersedes it.
                    let supersedes = candidate.merged
                        && result.blocks.last().is_some_and(|last| {
                            last.source_line_range.1 + 1 == index
                                && is_segment_prefix(&last.number, &candidate.token)
                        });
                    if supersedes {
                        let previous_start = result
                            .blocks
                            .last()
                            .map(|b| b.source_line_range.0)
                            .unwrap_or(start);
                        let last = result.blocks.len() - 1;
                        result.blocks[last] = ContentBlock {
                            source_line_range: (previous_start, index),
                            ..block
                        };
                    } else {
                        result.blocks.push(block);
                    }
                }
                None => {
                    // Continuation prose attaches to the open block; preamble
                    // before the first numbered heading is dropped.
                    if let Some(last) = result.blocks.last_mut() {
                        if !last.text.is_empty() {
                            last.text.push(' ');
                        }
                        last.text.push_str(trimmed);
                        last.source_line_range.1 = index;
                    }
                }
            }

            window.push(&line.text);
        }

        tracing::debug!(
            "Secondary extraction produced {} blocks from {} lines for document '{}'",
            result.blocks.len(),
            lines.len(),
            document_id
        );
        result
    }
}
