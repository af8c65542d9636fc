// src/matcher/context.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;

// A trailing run of digits and separators at the end of a line, e.g. "26.05."
// or "26-05". Candidate for continuation onto the next line.
static TRAILING_FRAGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:[.\-]\d{1,3}){0,3}[.\-]?)\s*$")
        .expect("Failed to compile TRAILING_FRAGMENT_RE")
});

/// Sliding look-back buffer over already-consumed lines.
///
/// Strictly streaming: the window never sees a line before the caller has
/// consumed it, so there is no look-ahead. One window is allocated per
/// document run and discarded afterwards.
#[derive(Debug)]
pub struct LineContextWindow {
    capacity: usize,
    lines: VecDeque<String>,
}

impl LineContextWindow {
    /// Default look-back depth in lines.
    pub const DEFAULT_CAPACITY: usize = 3;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            lines: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Records a consumed line, evicting the oldest once full.
    pub fn push(&mut self, line: &str) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    /// Most recently consumed line, if any.
    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Trailing digit/separator fragment of the previous line, if that line
    /// ended in something that could continue onto the current one.
    pub fn trailing_fragment(&self) -> Option<String> {
        let last = self.last()?;
        let caps = TRAILING_FRAGMENT_RE.captures(last)?;
        Some(caps.get(1)?.as_str().to_string())
    }
}
