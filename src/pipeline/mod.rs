//! Analysis job pipeline: classification, prompt selection, inference,
//! normalization and the orchestrator that sequences them.

pub mod classify;
pub mod inference;
pub mod normalize;
pub mod orchestrator;
pub mod prompts;
pub mod transient;

use thiserror::Error;

use crate::db::DatabaseError;
use inference::InferenceError;

/// Errors that can occur while driving a submission through the pipeline.
///
/// Validation errors are rejected before any job row exists. Type-detection
/// and inference errors finalize the job as failed and still propagate to
/// the caller. Parse degradation never appears here — the normalizer
/// absorbs it (see `normalize`).
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Could not determine report type: {0}")]
    TypeDetection(String),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),

    #[error("No analysis template for {selector}")]
    UnsupportedCombination { selector: String },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
