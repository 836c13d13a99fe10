//! Mock extractor and evaluator for testing the matching coordinator.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::matcher::{
    ConditionExtractor, LlmError, MatchStatus, MatcherError, TrialEvaluator, TrialMatch,
};
use crate::trials::TrialDetail;

/// Mock implementation of the ConditionExtractor trait.
#[derive(Debug)]
pub struct MockConditionExtractor {
    conditions: Option<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockConditionExtractor {
    /// Always extract these conditions.
    pub fn returning(conditions: Vec<String>) -> Self {
        Self {
            conditions: Some(conditions),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always fail, as if the oracle were unreachable.
    pub fn failing() -> Self {
        Self {
            conditions: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Patient texts received so far.
    pub fn recorded_inputs(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConditionExtractor for MockConditionExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn extract(&self, patient_text: &str) -> Result<Vec<String>, MatcherError> {
        self.calls.lock().unwrap().push(patient_text.to_string());
        self.conditions
            .clone()
            .ok_or_else(|| MatcherError::Llm(LlmError::Http("mock extraction failure".to_string())))
    }
}

/// Mock implementation of the TrialEvaluator trait.
///
/// Verdicts are configured per trial ID. Trials with no configured verdict
/// use the default verdict, or fail when none is set.
#[derive(Debug, Default)]
pub struct MockTrialEvaluator {
    verdicts: HashMap<String, (MatchStatus, f64)>,
    failures: HashSet<String>,
    default_verdict: Option<(MatchStatus, f64)>,
    evaluated: Mutex<Vec<String>>,
}

impl MockTrialEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return this verdict for `trial_id`.
    pub fn with_verdict(mut self, trial_id: &str, status: MatchStatus, confidence: f64) -> Self {
        self.verdicts.insert(trial_id.to_string(), (status, confidence));
        self
    }

    /// Fail evaluation for `trial_id`.
    pub fn with_failure(mut self, trial_id: &str) -> Self {
        self.failures.insert(trial_id.to_string());
        self
    }

    /// Verdict for any trial not configured explicitly.
    pub fn with_default_verdict(mut self, status: MatchStatus, confidence: f64) -> Self {
        self.default_verdict = Some((status, confidence));
        self
    }

    /// Trial IDs evaluated so far, in order.
    pub fn evaluated_ids(&self) -> Vec<String> {
        self.evaluated.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrialEvaluator for MockTrialEvaluator {
    fn name(&self) -> &str {
        "mock"
    }

    async fn evaluate(
        &self,
        _patient_text: &str,
        trial: &TrialDetail,
    ) -> Result<TrialMatch, MatcherError> {
        self.evaluated.lock().unwrap().push(trial.trial_id.clone());

        if self.failures.contains(&trial.trial_id) {
            return Err(MatcherError::Llm(LlmError::Json(
                "mock evaluation failure".to_string(),
            )));
        }

        let (status, confidence) = self
            .verdicts
            .get(&trial.trial_id)
            .copied()
            .or(self.default_verdict)
            .ok_or_else(|| {
                MatcherError::Llm(LlmError::Http(format!(
                    "no mock verdict for {}",
                    trial.trial_id
                )))
            })?;

        Ok(TrialMatch {
            trial_id: trial.trial_id.clone(),
            trial_name: trial.trial_name.clone(),
            match_status: status,
            confidence_score: confidence,
            inclusion_criteria_met: vec!["Diagnosis matches".to_string()],
            inclusion_criteria_not_met: Vec::new(),
            exclusion_criteria_violated: Vec::new(),
            reasoning: format!("Mock verdict for {}.", trial.trial_id),
            contact_info: trial.contact_info.clone(),
        })
    }
}
