//! Prompt/analysis selector: fixed templates keyed by (category × depth)
//! for document jobs, and a single assembled template for symptom
//! consultations.
//!
//! Template selection never substitutes: a combination outside the table is
//! an error, not a guess. Document templates share the response schema's
//! common fields and add the category-specific key the normalizer validates.

use crate::models::enums::{AgeGroup, AnalysisDepth, ReportType};
use crate::models::job::RatedSymptom;

use super::PipelineError;

/// A selected prompt pair ready for the inference call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisPrompt {
    pub system: &'static str,
    pub user: String,
}

const REPORT_SYSTEM: &str = "\
You are a medical report analyst. Read the provided report image carefully \
and respond ONLY with a single JSON object matching the requested schema. \
Never invent values that are not visible in the report. Do not wrap the \
JSON in markdown fences.";

const SYMPTOM_SYSTEM: &str = "\
You are an over-the-counter medication advisor. Based on the described \
symptoms, suggest OTC options and self-care guidance. Respond ONLY with a \
single JSON object matching the requested schema. You are not a doctor and \
must include a medical disclaimer. Do not wrap the JSON in markdown fences.";

/// Shared schema fragment: the base fields every analysis response carries.
const BASE_SCHEMA: &str = "\
\"summary\": string, \
\"generalRecommendations\": [string], \
\"warningFlags\": [string], \
\"educationalNotes\": [string], \
\"possibleConditions\": [{\"condition\": string, \"likelihood\": \"high\"|\"moderate\"|\"low\", \"reasoning\": string, \"nextSteps\": string}], \
\"medicalDisclaimer\": string";

// ═══════════════════════════════════════════════════════════
// Document dispatch table — depth × category
// ═══════════════════════════════════════════════════════════

/// Fixed per-cell analysis instruction. Category `Other` maps to one
/// depth-independent general template.
fn document_template(category: ReportType, depth: AnalysisDepth) -> &'static str {
    use AnalysisDepth::*;
    use ReportType::*;
    match (category, depth) {
        (BloodTest, Simple) => {
            "Give a brief, plain-language reading of this blood test for a \
             layperson. Flag only clearly abnormal values and keep the \
             summary under four sentences."
        }
        (BloodTest, Detailed) => {
            "Analyze every parameter in this blood test: value, unit, \
             reference range and whether it is normal, high or low. Explain \
             what each abnormal value can indicate."
        }
        (BloodTest, Educational) => {
            "Walk through this blood test as if teaching a patient: for each \
             parameter explain what the test measures, why it matters, and \
             what the measured value means. Fill educationalNotes generously."
        }
        (Radiology, Simple) => {
            "Give a brief, plain-language reading of this radiology report \
             for a layperson. State the modality, the key findings and the \
             overall impression in simple terms."
        }
        (Radiology, Detailed) => {
            "Analyze this radiology report thoroughly: modality, body \
             region, every finding, and the radiologist's impression. Note \
             any finding that warrants follow-up."
        }
        (Radiology, Educational) => {
            "Walk through this radiology report as if teaching a patient: \
             explain the imaging modality, what each finding means \
             anatomically, and why the impression follows from the findings. \
             Fill educationalNotes generously."
        }
        (Pathology, Simple) => {
            "Give a brief, plain-language reading of this pathology report \
             for a layperson. State the specimen, the key microscopic \
             findings and the diagnosis in simple terms."
        }
        (Pathology, Detailed) => {
            "Analyze this pathology report thoroughly: specimen, gross and \
             microscopic findings, and the diagnosis. Note any result that \
             warrants specialist follow-up."
        }
        (Pathology, Educational) => {
            "Walk through this pathology report as if teaching a patient: \
             explain what was examined, what each microscopic finding means, \
             and how the diagnosis was reached. Fill educationalNotes \
             generously."
        }
        // Unclassifiable documents get a general reading at any depth.
        (Other, _) => {
            "Read this medical document and summarize its purpose and \
             contents in plain language. Highlight anything a patient should \
             discuss with their clinician."
        }
    }
}

/// Category-specific key the response must include.
fn category_schema(category: ReportType) -> &'static str {
    match category {
        ReportType::BloodTest => {
            ", \"bloodTestResults\": [{\"testName\": string, \"value\": string, \
             \"unit\": string, \"referenceRange\": string, \"status\": \
             \"normal\"|\"high\"|\"low\", \"interpretation\": string}]"
        }
        ReportType::Radiology => {
            ", \"radiologyFindings\": {\"modality\": string, \"bodyRegion\": \
             string, \"findings\": [string], \"impression\": string}"
        }
        ReportType::Pathology => {
            ", \"pathologyFindings\": {\"specimen\": string, \
             \"microscopicFindings\": [string], \"diagnosis\": string}"
        }
        ReportType::Other => "",
    }
}

/// Select the fixed document template for (category, depth).
///
/// Every constructible (category, depth) pair has a cell; unknown category
/// strings are rejected earlier, at enum parse time.
pub fn report_prompt(category: ReportType, depth: AnalysisDepth, subtype: &str) -> AnalysisPrompt {
    let template = document_template(category, depth);
    let user = format!(
        "{template}\n\nThe document was classified as: {} ({subtype}).\n\n\
         Respond with JSON: {{{BASE_SCHEMA}{}}}",
        category.as_str(),
        category_schema(category),
    );
    AnalysisPrompt {
        system: REPORT_SYSTEM,
        user,
    }
}

// ═══════════════════════════════════════════════════════════
// Symptom consultation
// ═══════════════════════════════════════════════════════════

/// Descriptive text for a 1–5 severity rating.
pub fn severity_description(severity: u8) -> &'static str {
    match severity {
        1 => "barely noticeable",
        2 => "mild discomfort",
        3 => "moderate discomfort",
        4 => "severe",
        5 => "extreme severity - unbearable",
        _ => "unspecified severity",
    }
}

/// Dosage-guidance framing per age group.
fn age_group_guidance(age_group: AgeGroup) -> &'static str {
    match age_group {
        AgeGroup::Infant => {
            "The patient is an infant. Dosage guidance must be extremely \
             conservative and defer to a pediatrician for any medication."
        }
        AgeGroup::Child => {
            "The patient is a child. Use pediatric dosing and flag any \
             medication unsuitable for children."
        }
        AgeGroup::Teen => {
            "The patient is a teenager. Use adolescent dosing where it \
             differs from adult dosing."
        }
        AgeGroup::Adult => "The patient is an adult. Use standard adult dosing.",
        AgeGroup::Senior => {
            "The patient is a senior. Account for slower clearance and \
             common drug interactions in dosage guidance."
        }
    }
}

/// Assemble the symptom consultation prompt.
///
/// Caller-supplied symptom ordering is preserved, and each predefined
/// symptom carries its severity description. Free-text symptoms are escaped
/// so they cannot break out of the prompt structure.
pub fn symptom_prompt(
    symptoms: &[RatedSymptom],
    custom_symptoms: Option<&str>,
    age_group: AgeGroup,
) -> Result<AnalysisPrompt, PipelineError> {
    let custom = custom_symptoms.map(str::trim).filter(|s| !s.is_empty());
    if symptoms.is_empty() && custom.is_none() {
        return Err(PipelineError::UnsupportedCombination {
            selector: "symptom consultation without any symptoms".into(),
        });
    }

    let mut lines = Vec::new();
    for rated in symptoms {
        lines.push(format!(
            "- {} (severity {}/5: {})",
            rated.symptom.label(),
            rated.severity,
            severity_description(rated.severity),
        ));
    }
    if let Some(text) = custom {
        lines.push(format!(
            "- Patient's own description: {}",
            escape_xml_tags(text)
        ));
    }

    let user = format!(
        "A patient reports the following symptoms:\n{}\n\n{}\n\n\
         Suggest over-the-counter relief options and self-care guidance.\n\n\
         Respond with JSON: {{{BASE_SCHEMA}, \
         \"otcMedications\": [{{\"name\": string, \"dosage\": string, \
         \"frequency\": string, \"precautions\": [string]}}], \
         \"homeRemedies\": [string], \"seekCareIf\": [string]}}",
        lines.join("\n"),
        age_group_guidance(age_group),
    );

    Ok(AnalysisPrompt {
        system: SYMPTOM_SYSTEM,
        user,
    })
}

/// Escape XML-like tags in user text to prevent prompt boundary breakout.
fn escape_xml_tags(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
