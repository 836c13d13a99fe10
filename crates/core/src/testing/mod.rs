//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam (LLM, trial source, de-identification)
//! plus extractor/evaluator stubs for exercising the coordinator alone.
//!
//! # Example
//!
//! ```rust,ignore
//! use trialmatch_core::testing::{fixtures, MockLlmClient, MockTrialSource};
//!
//! let llm = MockLlmClient::with_response(fixtures::verdict_json("QUALIFIED", 0.9));
//! let source = MockTrialSource::new().with_trial(fixtures::trial_detail("T1", "Trial"));
//! ```

mod mock_deidentifier;
mod mock_llm;
mod mock_matcher;
mod mock_trial_source;

pub use mock_deidentifier::MockDeidentifier;
pub use mock_llm::MockLlmClient;
pub use mock_matcher::{MockConditionExtractor, MockTrialEvaluator};
pub use mock_trial_source::MockTrialSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::trials::TrialDetail;

    /// A de-identified patient record.
    pub const PATIENT_TEXT: &str = "58-year-old female with stage II HER2-positive breast cancer, \
        ECOG 1, no prior chemotherapy. Hypertension controlled on lisinopril.";

    /// Create a trial detail record with reasonable defaults.
    pub fn trial_detail(trial_id: &str, trial_name: &str) -> TrialDetail {
        TrialDetail {
            trial_id: trial_id.to_string(),
            trial_name: trial_name.to_string(),
            contact_info: "Dr. Test | Phone: 555-0100".to_string(),
            full_text: format!(
                "TRIAL ID: {trial_id}\nNAME: {trial_name}\nSTATUS: RECRUITING\n\
                 ELIGIBILITY CRITERIA:\nInclusion: adults 18+ with breast cancer\n\
                 Exclusion: prior chemotherapy"
            ),
        }
    }

    /// An evaluator response in the shape the model is asked to produce.
    pub fn verdict_json(status: &str, confidence: f64) -> String {
        serde_json::json!({
            "match_status": status,
            "confidence_score": confidence,
            "inclusion_criteria_met": ["Adult", "Breast cancer diagnosis"],
            "inclusion_criteria_not_met": [],
            "exclusion_criteria_violated": [],
            "reasoning": "Patient meets the core criteria. No exclusions apply."
        })
        .to_string()
    }

    /// A static corpus file body holding the given `(id, name)` trials.
    pub fn corpus_text(trials: &[(&str, &str)]) -> String {
        trials
            .iter()
            .map(|(id, name)| {
                format!(
                    "TRIAL ID: {id}\nNAME: {name}\nCONTACT: Dr. Test, 555-0100\n\
                     Inclusion: adults with breast cancer"
                )
            })
            .collect::<Vec<_>>()
            .join("\n---\n")
    }
}
