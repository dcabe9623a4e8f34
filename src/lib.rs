//! Clinsight: local analysis of medical artifacts with a unified history.
//!
//! The crate takes medical report images and over-the-counter symptom
//! consultations through a synchronous pipeline — classify, select a prompt
//! template, run inference against a local vision/language model, normalize
//! the response — and persists each run as a job record in one of three
//! SQLite stores (prescriptions, reports, symptom consultations). The
//! `history` module is the read side: cross-store listing, search,
//! ownership-checked deletion and counts.
//!
//! Typical wiring:
//!
//! ```no_run
//! use clinsight::config::InferenceConfig;
//! use clinsight::pipeline::orchestrator::AnalysisPipeline;
//!
//! clinsight::init_tracing();
//! let _conn = clinsight::db::open(&clinsight::config::app_data_dir().join("clinsight.db"))?;
//! let _pipeline = AnalysisPipeline::with_http(&InferenceConfig::default_local());
//! # Ok::<(), clinsight::db::DatabaseError>(())
//! ```

pub mod config;
pub mod db;
pub mod history;
pub mod models;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter; calling this twice is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
