//! Pipeline orchestrator: drives a submission from validation through
//! classification, inference and normalization to a terminal job row.
//!
//! Stage ordering and failure policy:
//! - validation failures reject the submission before any row exists
//! - once a row exists, every stage error finalizes the job as `failed`
//!   and still propagates to the caller
//! - unparseable analysis output is NOT a stage error — the normalizer
//!   degrades it and the job completes
//! - the spooled artifact is discarded on both paths

use std::sync::Arc;

use rusqlite::Connection;
use uuid::Uuid;

use crate::config::InferenceConfig;
use crate::db::repository;
use crate::models::enums::{AgeGroup, AnalysisDepth};
use crate::models::job::{RatedSymptom, ReportJob, SymptomJob};
use crate::models::result::{AnalysisKind, AnalysisResult};

use super::classify::{classify, Classification};
use super::inference::{HttpInferenceClient, InferenceClient};
use super::normalize::normalize;
use super::prompts::{report_prompt, symptom_prompt};
use super::transient::{SpoolStore, TransientStore};
use super::PipelineError;

/// Artifact formats the classifier and analyzer accept. PDFs are handed to
/// the inference collaborator as-is, like images.
const SUPPORTED_MIME_TYPES: &[&str] =
    &["image/png", "image/jpeg", "image/webp", "application/pdf"];

/// A document analysis request.
pub struct ReportSubmission<'a> {
    pub owner: Option<Uuid>,
    pub image: &'a [u8],
    pub mime_type: &'a str,
    pub depth: AnalysisDepth,
}

/// A symptom consultation request.
pub struct SymptomSubmission {
    pub owner: Option<Uuid>,
    pub symptoms: Vec<RatedSymptom>,
    pub custom_symptoms: Option<String>,
    pub age_group: AgeGroup,
}

/// Sequences pipeline stages over an injected inference client and
/// transient store.
pub struct AnalysisPipeline {
    client: Arc<dyn InferenceClient>,
    transient: Arc<dyn TransientStore>,
}

impl AnalysisPipeline {
    pub fn new(client: Arc<dyn InferenceClient>, transient: Arc<dyn TransientStore>) -> Self {
        Self { client, transient }
    }

    /// Production wiring: HTTP inference plus the default spool directory.
    pub fn with_http(config: &InferenceConfig) -> Self {
        Self::new(
            Arc::new(HttpInferenceClient::new(config)),
            Arc::new(SpoolStore::default_location()),
        )
    }

    /// Run a document submission to a terminal state.
    pub fn submit_report(
        &self,
        conn: &Connection,
        submission: ReportSubmission<'_>,
    ) -> Result<ReportJob, PipelineError> {
        if submission.image.is_empty() {
            return Err(PipelineError::Validation("document image is empty".into()));
        }
        if !SUPPORTED_MIME_TYPES.contains(&submission.mime_type) {
            return Err(PipelineError::Validation(format!(
                "unsupported document format '{}'",
                submission.mime_type
            )));
        }

        // Spooling is advisory: a failed stash is logged and the run
        // proceeds directly from the in-memory bytes.
        let image_ref = match self
            .transient
            .stash(submission.image, submission.mime_type)
        {
            Ok(reference) => Some(reference),
            Err(e) => {
                tracing::warn!(error = %e, "Could not spool artifact; continuing without");
                None
            }
        };

        let job = ReportJob::new(submission.owner, submission.depth, image_ref.clone());
        let _span = tracing::info_span!("report_job", job_id = %job.id).entered();

        // Once the stash succeeded, every exit must release it, including
        // database failures inside the run.
        let outcome = self.run_report(conn, job, &submission);
        if let Some(reference) = &image_ref {
            self.transient.discard(reference);
        }
        outcome
    }

    fn run_report(
        &self,
        conn: &Connection,
        job: ReportJob,
        submission: &ReportSubmission<'_>,
    ) -> Result<ReportJob, PipelineError> {
        repository::insert_report(conn, &job)?;
        tracing::info!(depth = %job.analysis_depth, "Report job created");

        match self.report_stages(conn, &job.id, submission) {
            Ok((classification, result)) => {
                let job = job
                    .classified(
                        classification.category,
                        classification.subtype,
                        classification.confidence,
                    )
                    .completed(result);
                repository::finalize_report(conn, &job)?;
                tracing::info!(report_type = %job.report_type, "Report job completed");
                Ok(job)
            }
            Err(e) => {
                self.finalize_failure(conn, &job, &e);
                Err(e)
            }
        }
    }

    /// Classification, analysis inference and normalization for one report.
    fn report_stages(
        &self,
        conn: &Connection,
        job_id: &Uuid,
        submission: &ReportSubmission<'_>,
    ) -> Result<(Classification, AnalysisResult), PipelineError> {
        let classification = classify(self.client.as_ref(), submission.image, submission.mime_type)?;
        repository::attach_classification(
            conn,
            job_id,
            classification.category,
            &classification.subtype,
            classification.confidence,
        )?;

        let prompt = report_prompt(
            classification.category,
            submission.depth,
            &classification.subtype,
        );
        let raw = self.client.generate_with_image(
            submission.image,
            submission.mime_type,
            &prompt.user,
            prompt.system,
        )?;
        let result = normalize(&raw, AnalysisKind::from(classification.category));
        Ok((classification, result))
    }

    /// Run a symptom consultation to a terminal state.
    pub fn submit_symptom(
        &self,
        conn: &Connection,
        submission: SymptomSubmission,
    ) -> Result<SymptomJob, PipelineError> {
        for rated in &submission.symptoms {
            if !(1..=5).contains(&rated.severity) {
                return Err(PipelineError::Validation(format!(
                    "severity {} for '{}' is outside 1-5",
                    rated.severity,
                    rated.symptom.label()
                )));
            }
        }
        // Template assembly also rejects an empty consultation, before any
        // row exists.
        let prompt = symptom_prompt(
            &submission.symptoms,
            submission.custom_symptoms.as_deref(),
            submission.age_group,
        )?;

        let job = SymptomJob::new(
            submission.owner,
            submission.symptoms,
            submission.custom_symptoms,
            submission.age_group,
        );
        repository::insert_symptom_consult(conn, &job)?;
        let _span = tracing::info_span!("symptom_job", job_id = %job.id).entered();
        tracing::info!(symptoms = %job.symptom_label(), age_group = %job.age_group, "Symptom job created");

        match self.client.generate(&prompt.user, prompt.system) {
            Ok(raw) => {
                let job = job.completed(normalize(&raw, AnalysisKind::Symptom));
                repository::finalize_symptom_consult(conn, &job)?;
                tracing::info!("Symptom job completed");
                Ok(job)
            }
            Err(e) => {
                let e = PipelineError::from(e);
                let failed = job.clone().failed(e.to_string());
                if let Err(db_err) = repository::finalize_symptom_consult(conn, &failed) {
                    tracing::error!(error = %db_err, "Could not record symptom job failure");
                }
                Err(e)
            }
        }
    }

    /// Record a stage failure on the job row. The original stage error wins;
    /// a secondary database failure is only logged.
    fn finalize_failure(&self, conn: &Connection, job: &ReportJob, error: &PipelineError) {
        tracing::warn!(error = %error, "Report job failed");
        let failed = job.clone().failed(error.to_string());
        if let Err(db_err) = repository::finalize_report(conn, &failed) {
            tracing::error!(error = %db_err, "Could not record report job failure");
        }
    }
}
