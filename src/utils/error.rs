// src/utils/error.rs
#![allow(dead_code)]
use thiserror::Error;

// Define specific error types for different parts of the application

#[derive(Error, Debug)]
pub enum MatchError {
    #[error("Failed to compile numbering pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unsupported numbering depth: {0} (plausible range is 1-4)")]
    Depth(usize),
}

#[derive(Error, Debug)]
pub enum ReconcileError {
    // The only hard failure out of the core: input that cannot be sequenced
    // at all. Everything softer degrades to an audit-trail entry.
    #[error("Corrupted extraction input: {0}")]
    CorruptedInput(String),
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse extraction input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid template hint '{0}': not a recognizable numbering pattern")]
    TemplateHint(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("Input loading failed: {0}")]
    Input(#[from] InputError),

    #[error("Pattern matcher setup failed: {0}")]
    Match(#[from] MatchError),

    #[error("Reconciliation failed: {0}")]
    Reconcile(#[from] ReconcileError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Batch processing failed: {0}")]
    Batch(String),
}
