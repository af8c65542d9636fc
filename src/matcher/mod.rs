// src/matcher/mod.rs
pub mod context;
pub mod pattern;

// Re-export key matcher types for convenience
#[allow(unused_imports)]
pub use context::LineContextWindow;
#[allow(unused_imports)]
pub use pattern::{MatcherConfig, NumberCandidate, PatternMatcher, TemplateHint};
