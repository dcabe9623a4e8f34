//! Polymorphic analysis result: one shared base plus a kind-specific detail.
//!
//! The wire shape is a single flat JSON object (camelCase) so the model's
//! output, the stored row, and the API payload are all the same document.
//! The detail variant is distinguished by its required key
//! (`bloodTestResults` / `radiologyFindings` / `pathologyFindings` /
//! `otcMedications`); a base-only object is a general report.

use serde::{Deserialize, Serialize};

/// Disclaimer substituted whenever the model omits one.
pub const DEFAULT_DISCLAIMER: &str =
    "This analysis is for informational purposes only and is not a medical \
     diagnosis. Always consult a qualified healthcare professional.";

/// Sentinel pushed into `warningFlags` when raw inference text could not be
/// parsed and the result was degraded to a safe fallback.
pub const PARSE_FAILURE_FLAG: &str = "analysis_parse_failure";

/// Which analysis schema a raw inference response is normalized against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    BloodTest,
    Radiology,
    Pathology,
    /// Document that classified as `other` — base fields only.
    GeneralReport,
    Symptom,
}

impl AnalysisKind {
    /// Artifact word used in degraded summaries ("Unable to parse <..> analysis").
    pub fn artifact_word(&self) -> &'static str {
        match self {
            Self::Symptom => "symptom",
            _ => "report",
        }
    }
}

impl From<super::enums::ReportType> for AnalysisKind {
    fn from(rt: super::enums::ReportType) -> Self {
        use super::enums::ReportType;
        match rt {
            ReportType::BloodTest => Self::BloodTest,
            ReportType::Radiology => Self::Radiology,
            ReportType::Pathology => Self::Pathology,
            ReportType::Other => Self::GeneralReport,
        }
    }
}

/// Fields shared by every analysis result regardless of kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultBase {
    pub summary: String,
    #[serde(default)]
    pub general_recommendations: Vec<String>,
    #[serde(default)]
    pub warning_flags: Vec<String>,
    #[serde(default)]
    pub educational_notes: Vec<String>,
    #[serde(default)]
    pub medical_disclaimer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_conditions: Vec<PossibleCondition>,
    /// Truncated copy of the raw model output, kept for diagnostics when the
    /// result was degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_excerpt: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PossibleCondition {
    pub condition: String,
    #[serde(default)]
    pub likelihood: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub next_steps: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BloodTestEntry {
    pub test_name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub reference_range: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub interpretation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadiologyFindings {
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub body_region: Option<String>,
    #[serde(default)]
    pub findings: Vec<String>,
    #[serde(default)]
    pub impression: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathologyFindings {
    #[serde(default)]
    pub specimen: Option<String>,
    #[serde(default)]
    pub microscopic_findings: Vec<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OtcMedication {
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub frequency: String,
    #[serde(default)]
    pub precautions: Vec<String>,
}

/// Kind-specific portion of the result.
///
/// Untagged: the required key of each variant is what distinguishes it on
/// the wire. `General` carries nothing and must stay last so it only matches
/// when no kind-specific key is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultDetail {
    BloodTest {
        #[serde(rename = "bloodTestResults")]
        blood_test_results: Vec<BloodTestEntry>,
    },
    Radiology {
        #[serde(rename = "radiologyFindings")]
        radiology_findings: RadiologyFindings,
    },
    Pathology {
        #[serde(rename = "pathologyFindings")]
        pathology_findings: PathologyFindings,
    },
    Symptom {
        #[serde(rename = "otcMedications")]
        otc_medications: Vec<OtcMedication>,
        #[serde(rename = "homeRemedies", default)]
        home_remedies: Vec<String>,
        #[serde(rename = "seekCareIf", default)]
        seek_care_if: Vec<String>,
    },
    General {},
}

/// A validated analysis result: shared base flattened with its kind detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(flatten)]
    pub base: ResultBase,
    #[serde(flatten)]
    pub detail: ResultDetail,
}

impl AnalysisResult {
    /// True when this result is the degraded fallback for unparseable output.
    pub fn is_degraded(&self) -> bool {
        self.base
            .warning_flags
            .iter()
            .any(|f| f == PARSE_FAILURE_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_wire_shape() {
        let result = AnalysisResult {
            base: ResultBase {
                summary: "One abnormal value".into(),
                medical_disclaimer: DEFAULT_DISCLAIMER.into(),
                ..Default::default()
            },
            detail: ResultDetail::BloodTest {
                blood_test_results: vec![BloodTestEntry {
                    test_name: "Hemoglobin".into(),
                    value: "10.2".into(),
                    status: "low".into(),
                    ..Default::default()
                }],
            },
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["summary"], "One abnormal value");
        assert_eq!(json["bloodTestResults"][0]["testName"], "Hemoglobin");
        // skipped when empty / absent
        assert!(json.get("possibleConditions").is_none());
        assert!(json.get("rawExcerpt").is_none());
    }

    #[test]
    fn detail_round_trips_by_required_key() {
        let original = AnalysisResult {
            base: ResultBase {
                summary: "Clear lungs".into(),
                medical_disclaimer: DEFAULT_DISCLAIMER.into(),
                ..Default::default()
            },
            detail: ResultDetail::Radiology {
                radiology_findings: RadiologyFindings {
                    modality: Some("X-ray".into()),
                    findings: vec!["No consolidation".into()],
                    ..Default::default()
                },
            },
        };
        let json = serde_json::to_string(&original).unwrap();
        let back: AnalysisResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn base_only_object_is_general() {
        let back: AnalysisResult =
            serde_json::from_str(r#"{"summary":"ok","medicalDisclaimer":"d"}"#).unwrap();
        assert_eq!(back.detail, ResultDetail::General {});
    }

    #[test]
    fn degraded_flag_detection() {
        let mut result = AnalysisResult {
            base: ResultBase::default(),
            detail: ResultDetail::General {},
        };
        assert!(!result.is_degraded());
        result.base.warning_flags.push(PARSE_FAILURE_FLAG.into());
        assert!(result.is_degraded());
    }

    #[test]
    fn artifact_word_per_kind() {
        assert_eq!(AnalysisKind::BloodTest.artifact_word(), "report");
        assert_eq!(AnalysisKind::GeneralReport.artifact_word(), "report");
        assert_eq!(AnalysisKind::Symptom.artifact_word(), "symptom");
    }
}
