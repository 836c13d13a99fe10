//! LLM-powered trial evaluation.
//!
//! One oracle call per trial. The response must contain a verdict object;
//! anything else drops the trial (see [`parse_verdict`]).

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::llm::{CompletionRequest, LlmClient};
use super::traits::{MatcherError, TrialEvaluator};
use super::types::TrialMatch;
use super::verdict::parse_verdict;
use crate::metrics;
use crate::trials::TrialDetail;

const SYSTEM_PROMPT: &str = r#"You are an expert clinical trial coordinator helping match patients to potentially suitable trials. Your goal is to identify reasonable matches based on available information.

Approach:
1. Read through all the patient information provided (in any format)
2. Review the trial's key criteria (condition, stage, treatments, etc.)
3. Determine if this seems like a REASONABLE MATCH
4. Be FLEXIBLE - patient data may be incomplete or in various formats
5. Focus on the MAIN condition and major criteria, not every minor detail

Match Criteria:
- QUALIFIED: The patient's main condition and key characteristics match the trial. They seem like a good candidate even if some minor details are missing.
- NOT_QUALIFIED: Clear mismatch (wrong disease, violates major exclusion like having the wrong cancer type)
- NEEDS_MORE_INFO: Could be a match but critical information is missing

Be lenient and practical. Look for potential matches, not perfect matches."#;

/// Configuration for the LLM trial evaluator.
#[derive(Debug, Clone)]
pub struct TrialEvaluatorConfig {
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation. Slightly above zero for flexible matching.
    pub temperature: f32,
}

impl Default for TrialEvaluatorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2000,
            temperature: 0.3,
        }
    }
}

/// LLM-powered trial evaluator.
pub struct LlmTrialEvaluator<C: LlmClient + ?Sized> {
    client: Arc<C>,
    config: TrialEvaluatorConfig,
}

impl<C: LlmClient + ?Sized> LlmTrialEvaluator<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            config: TrialEvaluatorConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(client: Arc<C>, config: TrialEvaluatorConfig) -> Self {
        Self { client, config }
    }

    fn build_user_prompt(&self, patient_text: &str, trial: &TrialDetail) -> String {
        format!(
            r#"Does this patient seem like a reasonable match for this clinical trial?

PATIENT INFORMATION:
{patient}

TRIAL:
{trial}

Provide your evaluation in JSON format:
{{
    "match_status": "QUALIFIED" | "NOT_QUALIFIED" | "NEEDS_MORE_INFO",
    "confidence_score": <0.0 to 1.0>,
    "inclusion_criteria_met": [<main criteria that match>],
    "inclusion_criteria_not_met": [<important criteria that don't match>],
    "exclusion_criteria_violated": [<major exclusions violated>],
    "reasoning": "<brief explanation of why this is or isn't a match>"
}}

Guidelines:
- QUALIFIED: Main condition matches, key criteria align, seems like a good candidate
- NOT_QUALIFIED: Wrong disease/condition or violates a major exclusion
- NEEDS_MORE_INFO: Could work but need critical details
- Be flexible with data format and missing information
- Focus on major factors (disease type, stage, prior treatments) not minor details"#,
            patient = patient_text,
            trial = trial.full_text,
        )
    }
}

#[async_trait]
impl<C: LlmClient + ?Sized> TrialEvaluator for LlmTrialEvaluator<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn evaluate(
        &self,
        patient_text: &str,
        trial: &TrialDetail,
    ) -> Result<TrialMatch, MatcherError> {
        let request = CompletionRequest::new(self.build_user_prompt(patient_text, trial))
            .with_system(SYSTEM_PROMPT)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let provider = self.client.provider();
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::LLM_REQUESTS
                    .with_label_values(&[provider, "evaluation", "error"])
                    .inc();
                warn!(trial_id = %trial.trial_id, error = %e, "Evaluation call failed");
                return Err(e.into());
            }
        };
        metrics::LLM_REQUESTS
            .with_label_values(&[provider, "evaluation", "success"])
            .inc();
        metrics::record_llm_usage(provider, &response.usage);

        let verdict = parse_verdict(&response.text).map_err(|e| {
            warn!(trial_id = %trial.trial_id, error = %e, "Discarding malformed verdict");
            MatcherError::from(e)
        })?;

        debug!(
            trial_id = %trial.trial_id,
            status = %verdict.match_status,
            confidence = verdict.confidence_score,
            "Trial evaluated"
        );
        Ok(verdict.into_match(trial))
    }
}
