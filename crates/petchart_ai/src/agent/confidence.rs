use serde::{Deserialize, Serialize};

use super::evidence::EvidenceBundle;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }
}

/// High needs both transcripts and at least one structured row; one source gives Medium.
pub fn derive_confidence(evidence: &EvidenceBundle) -> (Confidence, String) {
    match (evidence.has_transcripts(), evidence.has_structured_rows()) {
        (true, true) => (
            Confidence::High,
            "Answer grounded in both transcript and diagnostic data".to_string(),
        ),
        (true, false) => (
            Confidence::Medium,
            "Answer grounded in transcript data".to_string(),
        ),
        (false, true) => (
            Confidence::Medium,
            "Answer grounded in diagnostic data".to_string(),
        ),
        (false, false) => (Confidence::Low, "Limited evidence available".to_string()),
    }
}
