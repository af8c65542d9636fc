// src/matcher/pattern.rs

// --- Imports ---
use crate::matcher::context::LineContextWindow;
use crate::models::{number_segments, FormatFamily};
use crate::utils::error::MatchError;
use once_cell::sync::Lazy;
use regex::Regex;

// --- Constants ---
// Local confidence by token completeness. A deeper token carries more
// structure and is less likely to be a stray prose number.
const CONF_DEPTH_4: f64 = 0.70;
const CONF_DEPTH_3: f64 = 0.65;
const CONF_DEPTH_2: f64 = 0.60;
const CONF_DEPTH_1: f64 = 0.50;
// A token reassembled across a line wrap is inherently less trustworthy.
const SPLIT_TOKEN_PENALTY: f64 = 0.15;

// Continuation of a fragment that ended with a separator: leading digits.
static LEADING_DIGITS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,3}(?:[.\-]\d{1,3}){0,2})\.?(?:\s|$)")
        .expect("Failed to compile LEADING_DIGITS_RE")
});

// Continuation of a fragment that ended with a digit: leading separator.
static LEADING_SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([.\-]\d{1,3}(?:[.\-]\d{1,3}){0,2})\.?(?:\s|$)")
        .expect("Failed to compile LEADING_SEPARATOR_RE")
});

/// Expected numbering pattern for the document being processed, supplied by
/// the template analysis collaborator. Used only as a scoring/tie-break input.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateHint {
    pub pattern: String,
    pub family: FormatFamily,
    pub depth: usize,
}

impl TemplateHint {
    /// Parses a pattern string such as "26.05.00" or "26-05-29".
    pub fn parse(pattern: &str) -> Option<Self> {
        let family = FormatFamily::detect(pattern)?;
        let depth = number_segments(pattern)?.len();
        if !(1..=4).contains(&depth) {
            return None;
        }
        Some(Self {
            pattern: pattern.trim().to_string(),
            family,
            depth,
        })
    }
}

/// Per-run matcher configuration. Compiled patterns live on the matcher
/// instance, never in shared process state.
#[derive(Debug, Clone)]
pub struct MatcherConfig {
    /// Deepest plausible numbering level (segments).
    pub max_depth: usize,
    pub template: Option<TemplateHint>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            template: None,
        }
    }
}

/// A numbering token recognized on (or across) raw text lines.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberCandidate {
    /// Normalized token, trailing separator stripped.
    pub token: String,
    pub family: FormatFamily,
    /// Segment count; doubles as the inferred level.
    pub depth: usize,
    /// Local confidence in [0, 1] reflecting token completeness.
    pub confidence: f64,
    /// Token was reassembled from a fragment on the previous line.
    pub merged: bool,
    /// Rest of the current line after the token.
    pub remainder: String,
}

/// Recognizes hierarchical numbering tokens in raw text lines.
///
/// Tokens are anchored at line start (optionally after a SECTION/DIVISION/
/// PART keyword) with a word boundary after, so prose numbers inside a
/// sentence never match. Plausible depth is 1-4 segments; single-segment
/// tokens must carry a trailing dot ("26.") to count at all.
pub struct PatternMatcher {
    families: Vec<(FormatFamily, Regex)>,
    max_depth: usize,
    template_family: Option<FormatFamily>,
}

impl PatternMatcher {
    pub fn new(config: &MatcherConfig) -> Result<Self, MatchError> {
        if !(1..=4).contains(&config.max_depth) {
            return Err(MatchError::Depth(config.max_depth));
        }

        const KEYWORD: &str = r"(?:SECTION|DIVISION|PART)\s+";
        let families = vec![
            (
                FormatFamily::Dotted,
                Regex::new(&format!(
                    r"^\s*(?:{KEYWORD})?(\d{{1,3}}(?:\.\d{{1,3}}){{1,3}})\.?(?:\s|$)"
                ))?,
            ),
            (
                FormatFamily::Dashed,
                Regex::new(&format!(
                    r"^\s*(?:{KEYWORD})?(\d{{1,3}}(?:-\d{{1,3}}){{1,3}})(?:\s|$)"
                ))?,
            ),
            (
                FormatFamily::Spaced,
                Regex::new(&format!(
                    r"^\s*(?:{KEYWORD})?(\d{{1,3}}(?: {{1,2}}\d{{2,3}}){{1,3}})(?: +[^\s\d]|\s*$)"
                ))?,
            ),
            // Single-segment numbering requires the trailing dot.
            (
                FormatFamily::Dotted,
                Regex::new(&format!(r"^\s*(?:{KEYWORD})?(\d{{1,3}})\.(?:\s|$)"))?,
            ),
        ];

        Ok(Self {
            families,
            max_depth: config.max_depth,
            template_family: config.template.as_ref().map(|t| t.family),
        })
    }

    /// Attempts to recognize a numbering token on `line`, consulting the
    /// context window for fragments wrapped from the previous line.
    pub fn match_line(&self, line: &str, window: &LineContextWindow) -> Option<NumberCandidate> {
        let mut candidates = Vec::new();

        for (family, re) in &self.families {
            if let Some(caps) = re.captures(line) {
                if let Some(group) = caps.get(1) {
                    let token = normalize_token(group.as_str(), *family);
                    let depth = number_segments(&token).map(|s| s.len()).unwrap_or(0);
                    if depth == 0 || depth > self.max_depth {
                        continue;
                    }
                    candidates.push(NumberCandidate {
                        token,
                        family: *family,
                        depth,
                        confidence: base_confidence(depth),
                        merged: false,
                        remainder: remainder_after(line, group.end()),
                    });
                }
            }
        }

        if let Some(merged) = self.merged_candidate(line, window) {
            candidates.push(merged);
        }

        candidates
            .into_iter()
            .reduce(|best, c| if self.prefer(&c, &best) { c } else { best })
    }

    /// Detects a token split across a line wrap and reassembles it.
    fn merged_candidate(&self, line: &str, window: &LineContextWindow) -> Option<NumberCandidate> {
        let fragment = window.trailing_fragment()?;
        let ends_with_separator = fragment.ends_with(['.', '-']);

        let caps = if ends_with_separator {
            LEADING_DIGITS_RE.captures(line)?
        } else {
            LEADING_SEPARATOR_RE.captures(line)?
        };
        let continuation = caps.get(1)?;

        let assembled = format!("{}{}", fragment, continuation.as_str());
        let family = FormatFamily::detect(&assembled)?;
        let depth = number_segments(&assembled)?.len();
        // A merge always spans a separator, so depth 1 means the fragment
        // heuristic misfired.
        if depth < 2 || depth > self.max_depth {
            return None;
        }

        Some(NumberCandidate {
            token: normalize_token(&assembled, family),
            family,
            depth,
            confidence: (base_confidence(depth) - SPLIT_TOKEN_PENALTY).max(0.0),
            merged: true,
            remainder: remainder_after(line, continuation.end()),
        })
    }

    /// Tie-break policy: template family first, then more segments, then
    /// higher local confidence, then fixed family order. Deterministic, so
    /// an ambiguous match never escalates to a failure.
    fn prefer(&self, a: &NumberCandidate, b: &NumberCandidate) -> bool {
        let a_template = Some(a.family) == self.template_family;
        let b_template = Some(b.family) == self.template_family;
        if a_template != b_template {
            return a_template;
        }
        if a.depth != b.depth {
            return a.depth > b.depth;
        }
        if a.confidence != b.confidence {
            return a.confidence > b.confidence;
        }
        family_rank(a.family) < family_rank(b.family)
    }
}

fn family_rank(family: FormatFamily) -> usize {
    match family {
        FormatFamily::Dotted => 0,
        FormatFamily::Dashed => 1,
        FormatFamily::Spaced => 2,
    }
}

fn base_confidence(depth: usize) -> f64 {
    match depth {
        4.. => CONF_DEPTH_4,
        3 => CONF_DEPTH_3,
        2 => CONF_DEPTH_2,
        _ => CONF_DEPTH_1,
    }
}

fn normalize_token(raw: &str, family: FormatFamily) -> String {
    let trimmed = raw.trim().trim_end_matches(['.', '-']);
    match family {
        // OCR output sometimes doubles the spacing between segments.
        FormatFamily::Spaced => trimmed.split_whitespace().collect::<Vec<_>>().join(" "),
        _ => trimmed.to_string(),
    }
}

fn remainder_after(line: &str, end: usize) -> String {
    line[end..]
        .trim_start_matches(|c: char| c == '.' || c.is_whitespace())
        .to_string()
}
