//! Types for trial sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel used when a trial carries no contact details.
pub const CONTACT_NOT_AVAILABLE: &str = "Contact information not available";

/// Detail record for one trial, uniform across backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialDetail {
    /// Unique, non-empty trial identifier (e.g. an NCT number).
    pub trial_id: String,
    pub trial_name: String,
    pub contact_info: String,
    /// Labeled sections the evaluator reads: title, status, summary,
    /// eligibility criteria, age/sex constraints.
    pub full_text: String,
}

/// Health report for a trial source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    /// Source name (e.g. "static_corpus").
    pub source: String,
    pub online: bool,
    /// Human-readable detail ("42 trials loaded", "HTTP 502").
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

/// Errors from trial source operations.
///
/// None of these abort a matching run: search failures become an empty
/// candidate list and fetch failures skip the candidate.
#[derive(Debug, Error)]
pub enum TrialSourceError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Response carried no data event")]
    MissingPayload,

    #[error("Failed to decode embedded payload: {0}")]
    PayloadDecode(String),

    #[error("Failed to read trial corpus {path}: {reason}")]
    CorpusRead { path: String, reason: String },
}

impl TrialSourceError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TrialSourceError::ConnectionFailed(_) => "connection",
            TrialSourceError::Timeout => "timeout",
            TrialSourceError::Status { .. } => "status",
            TrialSourceError::MalformedEnvelope(_) => "envelope",
            TrialSourceError::MissingPayload => "missing_payload",
            TrialSourceError::PayloadDecode(_) => "decode",
            TrialSourceError::CorpusRead { .. } => "corpus",
        }
    }
}

/// A catalog of clinical trials.
#[async_trait]
pub trait TrialSource: Send + Sync {
    /// Name of this source for logging/metrics.
    fn name(&self) -> &str;

    /// Find candidate trial IDs for the given conditions, in retrieval order.
    ///
    /// `limit` is a page-size hint; sources without server-side search may
    /// ignore it and return everything they hold.
    async fn search(
        &self,
        conditions: &[String],
        limit: usize,
    ) -> Result<Vec<String>, TrialSourceError>;

    /// Fetch the detail record for one trial. `Ok(None)` means unknown ID.
    async fn fetch(&self, trial_id: &str) -> Result<Option<TrialDetail>, TrialSourceError>;

    /// Report whether the source is currently usable.
    async fn health(&self) -> SourceHealth;
}
