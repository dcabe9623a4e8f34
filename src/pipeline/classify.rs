//! Classifier dispatch: determine a document's category and subtype before
//! template-specific analysis.
//!
//! A response with no parseable category is fatal — there is no silent
//! fallback to `other`, because an analysis run against the wrong template
//! is worse than a failed job. A missing subtype or confidence, by
//! contrast, is a filled default.

use std::str::FromStr;

use serde::Deserialize;

use crate::models::enums::{ConfidenceLevel, ReportType};
use crate::models::job::UNKNOWN_SUBTYPE;

use super::inference::InferenceClient;
use super::normalize::strip_code_fences;
use super::PipelineError;

const CLASSIFY_SYSTEM: &str = "\
You are a medical document classifier. Look at the document image and \
identify what kind of medical report it is. Respond with a single JSON \
object and nothing else.";

const CLASSIFY_PROMPT: &str = "\
Classify this medical document. Respond with JSON:\n\
{\"category\": \"blood_test\" | \"radiology\" | \"pathology\" | \"other\",\n \
\"subtype\": short specific name such as \"CBC\", \"Chest X-ray\", \"Biopsy\",\n \
\"confidence\": \"high\" | \"medium\" | \"low\"}";

/// Detected document category, subtype and classifier confidence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub category: ReportType,
    pub subtype: String,
    pub confidence: ConfidenceLevel,
}

/// Run the classifier against the document image.
pub fn classify(
    client: &dyn InferenceClient,
    image: &[u8],
    mime_type: &str,
) -> Result<Classification, PipelineError> {
    let raw = client.generate_with_image(image, mime_type, CLASSIFY_PROMPT, CLASSIFY_SYSTEM)?;
    let classification = parse_classification(&raw)?;
    tracing::info!(
        category = %classification.category,
        subtype = %classification.subtype,
        confidence = %classification.confidence,
        "Document classified"
    );
    Ok(classification)
}

/// Parse the classifier's JSON response.
pub(crate) fn parse_classification(raw: &str) -> Result<Classification, PipelineError> {
    #[derive(Deserialize)]
    struct RawClassification {
        category: Option<String>,
        subtype: Option<String>,
        confidence: Option<String>,
    }

    let stripped = strip_code_fences(raw);
    let parsed: RawClassification = serde_json::from_str(stripped.trim())
        .map_err(|e| PipelineError::TypeDetection(format!("unparseable classifier response: {e}")))?;

    let category_text = parsed
        .category
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::TypeDetection("classifier response has no category".into())
        })?;
    let category = ReportType::from_str(category_text.trim().to_lowercase().as_str())
        .map_err(|_| {
            PipelineError::TypeDetection(format!("unrecognized category '{category_text}'"))
        })?;

    let subtype = parsed
        .subtype
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_SUBTYPE.to_string());
    let confidence = parsed
        .confidence
        .and_then(|c| ConfidenceLevel::from_str(c.trim().to_lowercase().as_str()).ok())
        .unwrap_or(ConfidenceLevel::Medium);

    Ok(Classification {
        category,
        subtype,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_response() {
        let c = parse_classification(
            r#"{"category": "blood_test", "subtype": "CBC", "confidence": "high"}"#,
        )
        .unwrap();
        assert_eq!(c.category, ReportType::BloodTest);
        assert_eq!(c.subtype, "CBC");
        assert_eq!(c.confidence, ConfidenceLevel::High);
    }

    #[test]
    fn parses_fenced_response() {
        let c = parse_classification(
            "```json\n{\"category\": \"radiology\", \"subtype\": \"Chest X-ray\"}\n```",
        )
        .unwrap();
        assert_eq!(c.category, ReportType::Radiology);
        assert_eq!(c.subtype, "Chest X-ray");
    }

    #[test]
    fn missing_subtype_and_confidence_get_defaults() {
        let c = parse_classification(r#"{"category": "pathology"}"#).unwrap();
        assert_eq!(c.subtype, UNKNOWN_SUBTYPE);
        assert_eq!(c.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn garbage_confidence_falls_back_to_medium() {
        let c = parse_classification(
            r#"{"category": "other", "confidence": "certain"}"#,
        )
        .unwrap();
        assert_eq!(c.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn missing_category_is_fatal() {
        let err = parse_classification(r#"{"subtype": "CBC"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::TypeDetection(_)));
    }

    #[test]
    fn unrecognized_category_is_fatal_not_other() {
        let err = parse_classification(r#"{"category": "ultrasound_report"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::TypeDetection(_)));
    }

    #[test]
    fn non_json_response_is_fatal() {
        let err = parse_classification("This looks like a blood test.").unwrap_err();
        assert!(matches!(err, PipelineError::TypeDetection(_)));
    }

    #[test]
    fn category_is_case_insensitive() {
        let c = parse_classification(r#"{"category": "Blood_Test"}"#).unwrap();
        assert_eq!(c.category, ReportType::BloodTest);
    }
}
