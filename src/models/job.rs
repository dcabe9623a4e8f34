//! Analysis job records and their status lifecycle.
//!
//! A job is created once per submission with status `Processing`, mutated at
//! most twice (classification attach, then final result + status) for report
//! jobs and once for symptom jobs. Each mutation is a pure transition on the
//! previous state; the repository layer enforces that terminal rows are
//! never written again.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AgeGroup, AnalysisDepth, ConfidenceLevel, JobStatus, ReportType, SymptomType};
use super::result::AnalysisResult;

/// Subtype recorded before classification, and when the classifier response
/// omits one.
pub const UNKNOWN_SUBTYPE: &str = "Unknown";

/// Creation timestamp at millisecond precision, the precision the store
/// persists, so a freshly built job compares equal to its loaded row.
fn created_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(now)
}

/// A document-analysis job (blood test, radiology, pathology, other).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportJob {
    pub id: Uuid,
    /// Weak reference to the owning user; None denotes a guest submission.
    pub owner: Option<Uuid>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub report_type: ReportType,
    pub report_subtype: String,
    pub type_confidence: ConfidenceLevel,
    pub analysis_depth: AnalysisDepth,
    /// Opaque reference into the transient spool, if staging succeeded.
    pub image_ref: Option<String>,
    pub result: Option<AnalysisResult>,
}

impl ReportJob {
    pub fn new(owner: Option<Uuid>, depth: AnalysisDepth, image_ref: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            status: JobStatus::Processing,
            created_at: created_now(),
            error_message: None,
            report_type: ReportType::Other,
            report_subtype: UNKNOWN_SUBTYPE.to_string(),
            type_confidence: ConfidenceLevel::Medium,
            analysis_depth: depth,
            image_ref,
            result: None,
        }
    }

    /// Created → Classified. A partial, non-terminal write: the detected type
    /// survives even if a later stage fails.
    pub fn classified(
        mut self,
        report_type: ReportType,
        subtype: String,
        confidence: ConfidenceLevel,
    ) -> Self {
        self.report_type = report_type;
        self.report_subtype = subtype;
        self.type_confidence = confidence;
        self
    }

    /// → Completed (terminal).
    pub fn completed(mut self, result: AnalysisResult) -> Self {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self
    }

    /// → Failed (terminal). Previously attached fields are retained.
    pub fn failed(mut self, message: String) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
        self
    }
}

/// A prescription record: medicines + OCR text echo. The OCR ingestion stage
/// is an external collaborator; this store participates in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionJob {
    pub id: Uuid,
    pub owner: Option<Uuid>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub medicines: Vec<String>,
    pub ocr_text: Option<String>,
    pub image_ref: Option<String>,
    pub result: Option<AnalysisResult>,
}

impl PrescriptionJob {
    pub fn new(owner: Option<Uuid>, medicines: Vec<String>, ocr_text: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            status: JobStatus::Processing,
            created_at: created_now(),
            error_message: None,
            medicines,
            ocr_text,
            image_ref: None,
            result: None,
        }
    }

    pub fn completed(mut self, result: AnalysisResult) -> Self {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self
    }

    pub fn failed(mut self, message: String) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
        self
    }
}

/// One caller-supplied symptom with its 1–5 severity rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedSymptom {
    pub symptom: SymptomType,
    pub severity: u8,
}

/// An over-the-counter symptom consultation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomJob {
    pub id: Uuid,
    pub owner: Option<Uuid>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
    /// Caller-supplied order is preserved.
    pub symptoms: Vec<RatedSymptom>,
    pub custom_symptoms: Option<String>,
    pub age_group: AgeGroup,
    pub result: Option<AnalysisResult>,
}

impl SymptomJob {
    pub fn new(
        owner: Option<Uuid>,
        symptoms: Vec<RatedSymptom>,
        custom_symptoms: Option<String>,
        age_group: AgeGroup,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            status: JobStatus::Processing,
            created_at: created_now(),
            error_message: None,
            symptoms,
            custom_symptoms,
            age_group,
            result: None,
        }
    }

    /// Display label used by history titles and search ("Headache, Fever").
    pub fn symptom_label(&self) -> String {
        if self.symptoms.is_empty() {
            return SymptomType::Custom.label().to_string();
        }
        self.symptoms
            .iter()
            .map(|s| s.symptom.label())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn completed(mut self, result: AnalysisResult) -> Self {
        self.status = JobStatus::Completed;
        self.result = Some(result);
        self
    }

    pub fn failed(mut self, message: String) -> Self {
        self.status = JobStatus::Failed;
        self.error_message = Some(message);
        self
    }
}
