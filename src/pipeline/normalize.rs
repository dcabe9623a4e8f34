//! Result normalizer: parse and repair raw inference text into a validated
//! `AnalysisResult`.
//!
//! This stage never fails. A response that cannot be parsed, or that lacks
//! the kind-specific required field, produces a degraded-but-completed
//! result instead of failing the job: the caller still gets a safe payload
//! and a diagnostic excerpt of whatever the model wrote. This asymmetry
//! with the classifier (which IS fatal on a missing category) is
//! deliberate — analyzing under the wrong template is worse than a failed
//! job, while a completed job with a fallback payload is still useful.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::models::result::{
    AnalysisKind, AnalysisResult, OtcMedication, PathologyFindings, RadiologyFindings,
    ResultBase, ResultDetail, DEFAULT_DISCLAIMER, PARSE_FAILURE_FLAG,
};

/// Fallback recommendation carried by every degraded result.
pub const CONSULT_FALLBACK: &str =
    "Consult a healthcare professional for a reliable interpretation.";

/// How much of the raw model output a degraded result retains.
const EXCERPT_MAX_CHARS: usize = 500;

static OPEN_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z]*[ \t]*\r?\n?").expect("static regex"));
static CLOSE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n?```$").expect("static regex"));

/// Strip a leading/trailing fenced-code marker (``` or ```json) if present.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let without_open = OPEN_FENCE.replace(trimmed, "");
    CLOSE_FENCE.replace(&without_open, "").trim().to_string()
}

/// Normalize raw inference text against the given kind's schema.
pub fn normalize(raw: &str, kind: AnalysisKind) -> AnalysisResult {
    let stripped = strip_code_fences(raw);
    let value: Value = match serde_json::from_str(&stripped) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, kind = ?kind, "Inference output is not JSON; degrading result");
            return degraded(raw, kind);
        }
    };
    let Some(obj) = value.as_object() else {
        tracing::warn!(kind = ?kind, "Inference output is not a JSON object; degrading result");
        return degraded(raw, kind);
    };

    let Some(detail) = extract_detail(obj, kind) else {
        tracing::warn!(kind = ?kind, "Required kind-specific field missing or malformed; degrading result");
        return degraded(raw, kind);
    };

    AnalysisResult {
        base: extract_base(obj),
        detail,
    }
}

// ── Extraction ─────────────────────────────────────────────────────────────

fn extract_base(obj: &serde_json::Map<String, Value>) -> ResultBase {
    ResultBase {
        summary: string_field(obj, "summary").unwrap_or_default(),
        general_recommendations: string_list(obj, "generalRecommendations"),
        warning_flags: string_list(obj, "warningFlags"),
        educational_notes: string_list(obj, "educationalNotes"),
        medical_disclaimer: string_field(obj, "medicalDisclaimer")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISCLAIMER.to_string()),
        possible_conditions: lenient_array(obj.get("possibleConditions")),
        raw_excerpt: string_field(obj, "rawExcerpt"),
    }
}

/// Validate and extract the kind-specific detail. None means the required
/// field is missing or has the wrong shape.
fn extract_detail(obj: &serde_json::Map<String, Value>, kind: AnalysisKind) -> Option<ResultDetail> {
    match kind {
        AnalysisKind::BloodTest => {
            let entries = obj.get("bloodTestResults")?.as_array()?;
            Some(ResultDetail::BloodTest {
                blood_test_results: lenient_items(entries),
            })
        }
        AnalysisKind::Radiology => {
            let findings = obj.get("radiologyFindings")?;
            if !findings.is_object() {
                return None;
            }
            let radiology_findings: RadiologyFindings =
                serde_json::from_value(findings.clone()).ok()?;
            Some(ResultDetail::Radiology { radiology_findings })
        }
        AnalysisKind::Pathology => {
            let findings = obj.get("pathologyFindings")?;
            if !findings.is_object() {
                return None;
            }
            let pathology_findings: PathologyFindings =
                serde_json::from_value(findings.clone()).ok()?;
            Some(ResultDetail::Pathology { pathology_findings })
        }
        AnalysisKind::Symptom => {
            let meds = obj.get("otcMedications")?.as_array()?;
            Some(ResultDetail::Symptom {
                otc_medications: lenient_items::<OtcMedication>(meds),
                home_remedies: string_list(obj, "homeRemedies"),
                seek_care_if: string_list(obj, "seekCareIf"),
            })
        }
        AnalysisKind::GeneralReport => Some(ResultDetail::General {}),
    }
}

/// The fixed degraded object for unparseable output.
fn degraded(raw: &str, kind: AnalysisKind) -> AnalysisResult {
    let detail = match kind {
        AnalysisKind::BloodTest => ResultDetail::BloodTest {
            blood_test_results: vec![],
        },
        AnalysisKind::Radiology => ResultDetail::Radiology {
            radiology_findings: RadiologyFindings::default(),
        },
        AnalysisKind::Pathology => ResultDetail::Pathology {
            pathology_findings: PathologyFindings::default(),
        },
        AnalysisKind::Symptom => ResultDetail::Symptom {
            otc_medications: vec![],
            home_remedies: vec![],
            seek_care_if: vec![],
        },
        AnalysisKind::GeneralReport => ResultDetail::General {},
    };

    AnalysisResult {
        base: ResultBase {
            summary: format!("Unable to parse {} analysis", kind.artifact_word()),
            general_recommendations: vec![CONSULT_FALLBACK.to_string()],
            warning_flags: vec![PARSE_FAILURE_FLAG.to_string()],
            educational_notes: vec![],
            medical_disclaimer: DEFAULT_DISCLAIMER.to_string(),
            possible_conditions: vec![],
            raw_excerpt: Some(raw.chars().take(EXCERPT_MAX_CHARS).collect()),
        },
        detail,
    }
}

// ── Coercion helpers ───────────────────────────────────────────────────────

fn string_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Missing or malformed list fields coerce to empty; non-string elements
/// are dropped.
fn string_list(obj: &serde_json::Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn lenient_array<T: DeserializeOwned>(value: Option<&Value>) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|arr| lenient_items(arr))
        .unwrap_or_default()
}

/// Parse an array leniently — skip items that fail to deserialize.
fn lenient_items<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}
