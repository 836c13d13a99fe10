//! Strict parsing of the oracle's eligibility verdict.
//!
//! Parsing is a pure function from response text to `Result`, so the
//! "drop the trial on any malformation" rule can be tested without an oracle.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::types::{MatchStatus, TrialMatch};
use crate::trials::TrialDetail;

static FENCED_OBJECT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced object regex")
});

/// Why a verdict was rejected.
#[derive(Debug, Error, PartialEq)]
pub enum VerdictError {
    #[error("response contains no JSON object")]
    NoJsonObject,

    #[error("malformed verdict: {0}")]
    Malformed(String),

    #[error("unknown match_status: {0}")]
    UnknownStatus(String),

    #[error("confidence_score {0} is not a number in [0, 1]")]
    ConfidenceOutOfRange(String),
}

/// A validated verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub match_status: MatchStatus,
    pub confidence_score: f64,
    pub inclusion_criteria_met: Vec<String>,
    pub inclusion_criteria_not_met: Vec<String>,
    pub exclusion_criteria_violated: Vec<String>,
    pub reasoning: String,
}

impl Verdict {
    /// Attach the verdict to the trial it was produced for.
    pub fn into_match(self, trial: &TrialDetail) -> TrialMatch {
        TrialMatch {
            trial_id: trial.trial_id.clone(),
            trial_name: trial.trial_name.clone(),
            match_status: self.match_status,
            confidence_score: self.confidence_score,
            inclusion_criteria_met: self.inclusion_criteria_met,
            inclusion_criteria_not_met: self.inclusion_criteria_not_met,
            exclusion_criteria_violated: self.exclusion_criteria_violated,
            reasoning: self.reasoning,
            contact_info: trial.contact_info.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    match_status: String,
    confidence_score: RawScore,
    inclusion_criteria_met: Vec<String>,
    inclusion_criteria_not_met: Vec<String>,
    exclusion_criteria_violated: Vec<String>,
    reasoning: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawScore {
    Number(f64),
    Text(String),
}

/// Locate the JSON object in an oracle response.
///
/// A fenced code block wins; otherwise the span from the first `{` to the
/// last `}`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    if let Some(m) = FENCED_OBJECT_RE.captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn parse_status(raw: &str) -> Result<MatchStatus, VerdictError> {
    let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "QUALIFIED" => Ok(MatchStatus::Qualified),
        "NOT_QUALIFIED" => Ok(MatchStatus::NotQualified),
        "NEEDS_MORE_INFO" => Ok(MatchStatus::NeedsMoreInfo),
        _ => Err(VerdictError::UnknownStatus(raw.to_string())),
    }
}

fn parse_score(raw: RawScore) -> Result<f64, VerdictError> {
    let (value, shown) = match raw {
        RawScore::Number(n) => (n, n.to_string()),
        RawScore::Text(s) => {
            let value = s
                .trim()
                .parse::<f64>()
                .map_err(|_| VerdictError::ConfidenceOutOfRange(s.clone()))?;
            (value, s)
        }
    };
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(VerdictError::ConfidenceOutOfRange(shown))
    }
}

/// Parse and validate a verdict from raw oracle text.
///
/// Every field is required; the confidence may be a number or a numeric
/// string but must land in [0, 1].
pub fn parse_verdict(text: &str) -> Result<Verdict, VerdictError> {
    let json = extract_json_object(text).ok_or(VerdictError::NoJsonObject)?;
    let raw: RawVerdict =
        serde_json::from_str(json).map_err(|e| VerdictError::Malformed(e.to_string()))?;

    Ok(Verdict {
        match_status: parse_status(&raw.match_status)?,
        confidence_score: parse_score(raw.confidence_score)?,
        inclusion_criteria_met: raw.inclusion_criteria_met,
        inclusion_criteria_not_met: raw.inclusion_criteria_not_met,
        exclusion_criteria_violated: raw.exclusion_criteria_violated,
        reasoning: raw.reasoning,
    })
}
