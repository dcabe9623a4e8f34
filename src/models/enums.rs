use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }
    };
}

str_enum!(JobStatus {
    Processing => "processing",
    Completed => "completed",
    Failed => "failed",
});

impl JobStatus {
    /// Completed and Failed are terminal: no field of a job row may be
    /// mutated once either has been written.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

str_enum!(ReportType {
    BloodTest => "blood_test",
    Radiology => "radiology",
    Pathology => "pathology",
    Other => "other",
});

str_enum!(AnalysisDepth {
    Simple => "simple",
    Detailed => "detailed",
    Educational => "educational",
});

str_enum!(ConfidenceLevel {
    High => "high",
    Medium => "medium",
    Low => "low",
});

str_enum!(AgeGroup {
    Infant => "infant",
    Child => "child",
    Teen => "teen",
    Adult => "adult",
    Senior => "senior",
});

str_enum!(SymptomType {
    Headache => "headache",
    Fever => "fever",
    Cough => "cough",
    SoreThroat => "sore_throat",
    RunnyNose => "runny_nose",
    Nausea => "nausea",
    Vomiting => "vomiting",
    Diarrhea => "diarrhea",
    Constipation => "constipation",
    MusclePain => "muscle_pain",
    Fatigue => "fatigue",
    Dizziness => "dizziness",
    SkinRash => "skin_rash",
    Heartburn => "heartburn",
    Custom => "custom",
});

impl SymptomType {
    /// Human-readable label used in prompts and history titles.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Headache => "Headache",
            Self::Fever => "Fever",
            Self::Cough => "Cough",
            Self::SoreThroat => "Sore throat",
            Self::RunnyNose => "Runny nose",
            Self::Nausea => "Nausea",
            Self::Vomiting => "Vomiting",
            Self::Diarrhea => "Diarrhea",
            Self::Constipation => "Constipation",
            Self::MusclePain => "Muscle pain",
            Self::Fatigue => "Fatigue",
            Self::Dizziness => "Dizziness",
            Self::SkinRash => "Skin rash",
            Self::Heartburn => "Heartburn",
            Self::Custom => "Custom symptoms",
        }
    }
}

str_enum!(RecordKind {
    Prescription => "prescription",
    Report => "report",
    Otc => "otc",
});

impl RecordKind {
    /// Declared merge order — the stable tie-break for history aggregation.
    pub fn merge_rank(&self) -> u8 {
        match self {
            Self::Prescription => 0,
            Self::Report => 1,
            Self::Otc => 2,
        }
    }
}

str_enum!(SortField {
    CreatedAt => "created_at",
    Status => "status",
});

str_enum!(SortOrder {
    Asc => "asc",
    Desc => "desc",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips() {
        for s in ["processing", "completed", "failed"] {
            assert_eq!(JobStatus::from_str(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = ReportType::from_str("x_ray").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn fourteen_predefined_symptoms_plus_custom() {
        let all = [
            "headache", "fever", "cough", "sore_throat", "runny_nose",
            "nausea", "vomiting", "diarrhea", "constipation", "muscle_pain",
            "fatigue", "dizziness", "skin_rash", "heartburn",
        ];
        assert_eq!(all.len(), 14);
        for s in all {
            assert_ne!(SymptomType::from_str(s).unwrap(), SymptomType::Custom);
        }
        assert_eq!(SymptomType::from_str("custom").unwrap(), SymptomType::Custom);
    }

    #[test]
    fn merge_rank_follows_declared_order() {
        assert!(RecordKind::Prescription.merge_rank() < RecordKind::Report.merge_rank());
        assert!(RecordKind::Report.merge_rank() < RecordKind::Otc.merge_rank());
    }

    #[test]
    fn serde_uses_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReportType::BloodTest).unwrap(),
            "\"blood_test\""
        );
        assert_eq!(
            serde_json::to_string(&SymptomType::SoreThroat).unwrap(),
            "\"sore_throat\""
        );
    }
}
