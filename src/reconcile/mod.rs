// src/reconcile/mod.rs
pub mod applier;
pub mod engine;

// Re-export key reconciliation types for convenience
#[allow(unused_imports)]
pub use applier::{CorrectionApplier, DEFAULT_THRESHOLD};
#[allow(unused_imports)]
pub use engine::{EngineConfig, ReconciliationEngine};

use crate::extractors::primary::{PrimaryAdapter, PrimaryUnit};
use crate::extractors::secondary::{SecondaryAdapter, SecondaryLine};
use crate::matcher::pattern::{MatcherConfig, TemplateHint};
use crate::models::{AuditTrail, ExtractionResult};
use crate::utils::error::AppError;

/// Per-run tunables for the whole pipeline. Defaults mirror the shipped
/// configuration; none of these are fixed semantics.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Minimum confidence for a correction to be applied.
    pub threshold: f64,
    /// Bounded look-ahead of the alignment window (secondary blocks).
    pub lookahead: usize,
    /// Look-back depth of the line context window.
    pub context_window: usize,
    /// Deepest plausible numbering level.
    pub max_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            lookahead: 5,
            context_window: 3,
            max_depth: 4,
        }
    }
}

/// Single entry operation: normalize both extractions, reconcile them, and
/// apply accepted corrections.
///
/// One sequential pass per document (Extracted -> Reconciled -> Applied);
/// no internal suspension points, no retries. Empty inputs degrade to a
/// trivial result rather than failing.
pub fn validate_extraction(
    units: &[PrimaryUnit],
    lines: &[SecondaryLine],
    template_hint: Option<TemplateHint>,
    config: &PipelineConfig,
    document_id: &str,
) -> Result<(ExtractionResult, AuditTrail), AppError> {
    tracing::info!("Step 1: Normalizing primary extraction for '{}'", document_id);
    let primary = PrimaryAdapter::normalize(units, document_id)?;

    tracing::info!("Step 2: Extracting secondary structure from {} raw lines", lines.len());
    let matcher_config = MatcherConfig {
        max_depth: config.max_depth,
        template: template_hint.clone(),
    };
    let secondary =
        SecondaryAdapter::new(&matcher_config, config.context_window)?.extract(lines, document_id);

    tracing::info!("Step 3: Reconciling {} primary vs {} secondary blocks",
        primary.blocks.len(), secondary.blocks.len());
    let engine = ReconciliationEngine::new(
        EngineConfig {
            lookahead: config.lookahead,
        },
        template_hint,
    );
    let discrepancies = engine.reconcile(&primary, &secondary);

    tracing::info!("Step 4: Applying corrections at threshold {:.2}", config.threshold);
    let (validated, trail) = CorrectionApplier::new(config.threshold).apply(primary, &discrepancies);

    Ok((validated, trail))
}
