//! LLM-powered condition extraction.
//!
//! Asks the oracle for the primary diagnosis, stage and notable biomarkers
//! of a patient as a JSON array of short search terms.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::llm::{CompletionRequest, LlmClient};
use super::traits::{ConditionExtractor, MatcherError};
use crate::metrics;

static ARRAY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("array regex"));
static QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+)""#).expect("quoted regex"));

/// Configuration for the LLM condition extractor.
#[derive(Debug, Clone)]
pub struct ConditionExtractorConfig {
    /// Maximum tokens for the LLM response.
    pub max_tokens: u32,
    /// Temperature for generation.
    pub temperature: f32,
}

impl Default for ConditionExtractorConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.1,
        }
    }
}

/// LLM-powered condition extractor.
pub struct LlmConditionExtractor<C: LlmClient + ?Sized> {
    client: Arc<C>,
    config: ConditionExtractorConfig,
}

impl<C: LlmClient + ?Sized> LlmConditionExtractor<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            config: ConditionExtractorConfig::default(),
        }
    }

    /// Create with custom configuration.
    pub fn with_config(client: Arc<C>, config: ConditionExtractorConfig) -> Self {
        Self { client, config }
    }

    fn build_prompt(&self, patient_text: &str) -> String {
        format!(
            r#"Analyze this patient's medical information and extract the PRIMARY medical condition(s)
that should be used to search for clinical trials. Focus on the main diagnosis, disease type, and stage.

Patient Information:
{patient_text}

Return ONLY a JSON array of search terms, like: ["breast cancer", "stage IV", "HER2 positive"]

Be specific but also practical for clinical trial searches. Include:
- Primary disease/condition
- Disease stage or severity if mentioned
- Important biomarkers or subtypes

Return format: ["term1", "term2", "term3"]"#
        )
    }
}

/// Pull search terms out of an oracle response.
///
/// Prefers a bracketed JSON array; falls back to every double-quoted
/// substring. Terms are trimmed, empties dropped, order and duplicates kept.
pub fn parse_conditions(text: &str) -> Vec<String> {
    let from_array = ARRAY_RE
        .find(text)
        .and_then(|m| serde_json::from_str::<Vec<serde_json::Value>>(m.as_str()).ok())
        .map(|items| {
            items
                .into_iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s),
                    serde_json::Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect::<Vec<_>>()
        });

    let terms = match from_array {
        Some(terms) => terms,
        None => QUOTED_RE
            .captures_iter(text)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect(),
    };

    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

#[async_trait]
impl<C: LlmClient + ?Sized> ConditionExtractor for LlmConditionExtractor<C> {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(&self, patient_text: &str) -> Result<Vec<String>, MatcherError> {
        let request = CompletionRequest::new(self.build_prompt(patient_text))
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let provider = self.client.provider();
        let response = match self.client.complete(request).await {
            Ok(response) => response,
            Err(e) => {
                metrics::LLM_REQUESTS
                    .with_label_values(&[provider, "extraction", "error"])
                    .inc();
                warn!(error = %e, "Condition extraction call failed");
                return Err(e.into());
            }
        };
        metrics::LLM_REQUESTS
            .with_label_values(&[provider, "extraction", "success"])
            .inc();
        metrics::record_llm_usage(provider, &response.usage);

        let conditions = parse_conditions(&response.text);
        debug!(raw = %response.text.trim(), conditions = ?conditions, "Extracted conditions");
        Ok(conditions)
    }
}
