//! Matching result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Eligibility verdict for one patient/trial pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Qualified,
    NotQualified,
    NeedsMoreInfo,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Qualified => "QUALIFIED",
            MatchStatus::NotQualified => "NOT_QUALIFIED",
            MatchStatus::NeedsMoreInfo => "NEEDS_MORE_INFO",
        }
    }

    /// Lowercase label for metrics.
    pub fn metric_label(&self) -> &'static str {
        match self {
            MatchStatus::Qualified => "qualified",
            MatchStatus::NotQualified => "not_qualified",
            MatchStatus::NeedsMoreInfo => "needs_more_info",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One evaluated trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialMatch {
    pub trial_id: String,
    pub trial_name: String,
    pub match_status: MatchStatus,
    /// Always within [0.0, 1.0].
    pub confidence_score: f64,
    pub inclusion_criteria_met: Vec<String>,
    pub inclusion_criteria_not_met: Vec<String>,
    pub exclusion_criteria_violated: Vec<String>,
    pub reasoning: String,
    pub contact_info: String,
}

/// Outcome of a full matching run, with diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRun {
    pub run_id: Uuid,
    /// Search terms actually sent to the trial source.
    pub conditions: Vec<String>,
    /// True when extraction yielded nothing and the fallback term was used.
    pub used_fallback_condition: bool,
    pub candidates_found: usize,
    pub candidates_evaluated: usize,
    /// Candidates skipped for a missing detail or dropped for a bad verdict.
    pub candidates_dropped: usize,
    /// Set when the search itself failed, which yields zero candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_failure: Option<String>,
    /// True when the caller went away before all candidates were evaluated.
    pub cancelled: bool,
    /// Sorted by confidence, truncated to the requested count.
    pub matches: Vec<TrialMatch>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MatchRun {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            conditions: Vec::new(),
            used_fallback_condition: false,
            candidates_found: 0,
            candidates_evaluated: 0,
            candidates_dropped: 0,
            search_failure: None,
            cancelled: false,
            matches: Vec::new(),
            started_at,
            finished_at: started_at,
        }
    }

    /// Outcome label for metrics.
    pub fn result_label(&self) -> &'static str {
        if self.cancelled {
            "cancelled"
        } else if self.candidates_found == 0 {
            "no_candidates"
        } else if self.matches.is_empty() {
            "no_matches"
        } else {
            "matched"
        }
    }
}
