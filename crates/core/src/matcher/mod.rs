//! Patient-to-trial matching.
//!
//! A run has four stages:
//! 1. Extract search conditions from the patient text (LLM)
//! 2. Retrieve candidate trial IDs from the configured [`TrialSource`](crate::trials::TrialSource)
//! 3. Fetch each candidate's detail record
//! 4. Evaluate eligibility per candidate (LLM), then rank by confidence
//!
//! [`TrialMatcher`] drives the stages; [`ProgressSink`] and [`stream_match`]
//! expose progress to streaming callers; [`render_report`] formats results.

mod condition_extractor;
mod config;
mod coordinator;
mod evaluator;
mod llm;
mod progress;
mod report;
mod traits;
mod types;
mod verdict;

pub use condition_extractor::{parse_conditions, ConditionExtractorConfig, LlmConditionExtractor};
pub use config::{LlmConfig, LlmProvider, MatcherConfig};
pub use coordinator::{create_trial_matcher, TrialMatcher};
pub use evaluator::{LlmTrialEvaluator, TrialEvaluatorConfig};
pub use llm::{
    create_llm_client, AnthropicClient, CompletionRequest, CompletionResponse, LlmClient,
    LlmError, LlmUsage, OllamaClient,
};
pub use progress::{stream_match, MatchEvent, ProgressSink};
pub use report::{render_report, NO_TRIALS_FOUND};
pub use traits::{ConditionExtractor, MatcherError, TrialEvaluator};
pub use types::{MatchRun, MatchStatus, TrialMatch};
pub use verdict::{extract_json_object, parse_verdict, Verdict, VerdictError};
