//! Traits for matching pipeline components.

use async_trait::async_trait;
use thiserror::Error;

use super::llm::LlmError;
use super::types::TrialMatch;
use super::verdict::VerdictError;
use crate::trials::{TrialDetail, TrialSourceError};

/// Errors that can occur during matching operations.
#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Invalid verdict: {0}")]
    Verdict(#[from] VerdictError),

    #[error("Trial source error: {0}")]
    TrialSource(#[from] TrialSourceError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Turns free-text patient data into search terms.
#[async_trait]
pub trait ConditionExtractor: Send + Sync {
    /// Name of this extractor for logging.
    fn name(&self) -> &str;

    /// Extract conditions in oracle output order. Duplicates are kept.
    ///
    /// An empty list is a valid answer; the caller substitutes a fallback term.
    async fn extract(&self, patient_text: &str) -> Result<Vec<String>, MatcherError>;
}

/// Judges one patient against one trial.
#[async_trait]
pub trait TrialEvaluator: Send + Sync {
    /// Name of this evaluator for logging.
    fn name(&self) -> &str;

    /// Produce a verdict, or an error meaning "drop this trial".
    async fn evaluate(
        &self,
        patient_text: &str,
        trial: &TrialDetail,
    ) -> Result<TrialMatch, MatcherError>;
}
