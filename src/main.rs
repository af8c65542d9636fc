// src/main.rs
mod extractors;
mod matcher;
mod models;
mod reconcile;
mod storage;
mod utils;

use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use extractors::primary::PrimaryUnit;
use extractors::secondary::SecondaryLine;
use matcher::pattern::TemplateHint;
use reconcile::PipelineConfig;
use storage::StorageManager;
use utils::error::InputError;
use utils::AppError;

/// Command Line Interface for the cross-method extraction validator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Primary extraction JSON (native document parser output)
    #[arg(short, long)]
    primary: Option<PathBuf>,

    /// Secondary extraction: raw OCR text (.txt) or per-line JSON (.json)
    #[arg(short, long)]
    secondary: Option<PathBuf>,

    /// Expected numbering pattern for this document, e.g. "26.05.00"
    #[arg(long)]
    template_hint: Option<String>,

    /// Confidence threshold for applying corrections
    #[arg(long, default_value_t = reconcile::DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Bounded look-ahead of the alignment window (secondary blocks)
    #[arg(long, default_value_t = 5)]
    lookahead: usize,

    /// Look-back window length for split numbering tokens
    #[arg(long, default_value_t = 3)]
    context_window: usize,

    /// Document identifier (defaults to the primary file stem)
    #[arg(long)]
    document_id: Option<String>,

    /// Batch manifest JSON with multiple documents (overrides --primary/--secondary)
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Output directory for validated extractions and audit reports
    #[arg(short, long, default_value = "./output")]
    output_dir: String,
}

/// One entry of a batch manifest.
#[derive(Debug, Clone, Deserialize)]
struct BatchJob {
    primary: PathBuf,
    secondary: PathBuf,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default)]
    template_hint: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::info!("Starting processing for args: {:?}", args);

    let config = PipelineConfig {
        threshold: args.threshold,
        lookahead: args.lookahead,
        context_window: args.context_window,
        ..PipelineConfig::default()
    };

    // 3. Batch mode: fan out one blocking task per document. Reconciliation
    //    itself stays single-threaded and shares nothing between documents.
    if let Some(manifest_path) = &args.batch {
        let jobs = load_batch_manifest(manifest_path)?;
        tracing::info!("Loaded batch manifest with {} jobs", jobs.len());

        let mut tasks = tokio::task::JoinSet::new();
        for job in jobs {
            let config = config.clone();
            let output_dir = args.output_dir.clone();
            tasks.spawn_blocking(move || {
                let document_id = job
                    .document_id
                    .clone()
                    .unwrap_or_else(|| file_stem(&job.primary));
                let outcome = process_document(
                    &job.primary,
                    &job.secondary,
                    job.template_hint.as_deref(),
                    &document_id,
                    &config,
                    &output_dir,
                );
                (document_id, outcome)
            });
        }

        let mut success_count = 0;
        let mut failure_count = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((document_id, Ok(()))) => {
                    tracing::info!("Validated document '{}'", document_id);
                    success_count += 1;
                }
                Ok((document_id, Err(e))) => {
                    tracing::error!("Failed to validate document '{}': {}", document_id, e);
                    failure_count += 1;
                }
                Err(e) => {
                    tracing::error!("Batch worker panicked: {}", e);
                    failure_count += 1;
                }
            }
        }

        tracing::info!(
            "Batch finished. Success: {}, Failures: {}",
            success_count,
            failure_count
        );
        if success_count == 0 && failure_count > 0 {
            return Err(AppError::Batch(format!(
                "All {} documents failed validation",
                failure_count
            )));
        }
        return Ok(());
    }

    // 4. Single-document mode
    let (primary_path, secondary_path) = match (&args.primary, &args.secondary) {
        (Some(p), Some(s)) => (p.clone(), s.clone()),
        _ => {
            return Err(AppError::Config(
                "Either --batch or both --primary and --secondary are required".to_string(),
            ))
        }
    };
    let document_id = args
        .document_id
        .clone()
        .unwrap_or_else(|| file_stem(&primary_path));

    process_document(
        &primary_path,
        &secondary_path,
        args.template_hint.as_deref(),
        &document_id,
        &config,
        &args.output_dir,
    )?;
    tracing::info!("Validated document '{}'", document_id);
    Ok(())
}

/// Runs the full pipeline for one document and persists the outputs.
fn process_document(
    primary_path: &Path,
    secondary_path: &Path,
    template_hint: Option<&str>,
    document_id: &str,
    config: &PipelineConfig,
    output_dir: &str,
) -> Result<(), AppError> {
    let units = load_primary_units(primary_path)?;
    let lines = load_secondary_lines(secondary_path)?;
    let hint = template_hint
        .map(|raw| {
            TemplateHint::parse(raw).ok_or_else(|| InputError::TemplateHint(raw.to_string()))
        })
        .transpose()?;

    let (validated, trail) =
        reconcile::validate_extraction(&units, &lines, hint, config, document_id)?;

    let storage = StorageManager::new(output_dir)?;
    let validated_path = storage.save_validated(&validated)?;
    let report_path = storage.save_audit_report(document_id, &trail)?;
    tracing::info!(
        "Document '{}': {} corrections applied, {} skipped ({}, {})",
        document_id,
        trail.applied_count(),
        trail.skipped_count(),
        validated_path.display(),
        report_path.display()
    );
    Ok(())
}

fn load_primary_units(path: &Path) -> Result<Vec<PrimaryUnit>, InputError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn load_secondary_lines(path: &Path) -> Result<Vec<SecondaryLine>, InputError> {
    let raw = std::fs::read_to_string(path)?;
    if path.extension().is_some_and(|ext| ext == "json") {
        Ok(serde_json::from_str(&raw)?)
    } else {
        Ok(SecondaryLine::from_plain_text(&raw))
    }
}

fn load_batch_manifest(path: &Path) -> Result<Vec<BatchJob>, InputError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
