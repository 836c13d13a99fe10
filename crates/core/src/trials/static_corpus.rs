//! Flat-file trial corpus.
//!
//! The corpus is a text file of trial blocks separated by `\n---\n`, or by a
//! line of 80 `=` in the legacy format. Each block carries labeled fields:
//!
//! ```text
//! TRIAL ID: NCT01234567
//! NAME: Trastuzumab in HER2+ Breast Cancer
//! CONTACT: Dr. Smith, 555-0100
//! ...free text the evaluator reads...
//! ```

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

use super::types::{
    SourceHealth, TrialDetail, TrialSource, TrialSourceError, CONTACT_NOT_AVAILABLE,
};

const BLOCK_SEPARATOR: &str = "\n---\n";

static TRIAL_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)TRIAL ID:\s*(\S+)").expect("trial id regex"));
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)NAME:\s*(.+?)(?:\n|$)").expect("name regex"));
static LEGACY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)Trial Name:\s*(.+?)(?:\n|$)").expect("legacy name regex"));
static CONTACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)CONTACT:\s*(.+?)(?:\n|$)").expect("contact regex"));

/// Trial source backed by a pre-parsed flat-file corpus.
#[derive(Debug, Clone)]
pub struct StaticCorpusSource {
    trials: Vec<TrialDetail>,
}

impl StaticCorpusSource {
    /// Read and parse the corpus file. Parsing happens once, here.
    pub fn from_path(path: &Path) -> Result<Self, TrialSourceError> {
        let text = std::fs::read_to_string(path).map_err(|e| TrialSourceError::CorpusRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let source = Self::from_text(&text);
        info!(
            path = %path.display(),
            trials = source.trials.len(),
            "Loaded static trial corpus"
        );
        Ok(source)
    }

    /// Parse a corpus from its text.
    pub fn from_text(text: &str) -> Self {
        Self {
            trials: parse_corpus(text),
        }
    }

    /// Parsed trials, in file order.
    pub fn trials(&self) -> &[TrialDetail] {
        &self.trials
    }
}

/// Split a corpus into trial blocks and extract the labeled fields.
///
/// Blocks without a `TRIAL ID:` are discarded, as are later blocks that
/// repeat an ID already seen.
pub fn parse_corpus(text: &str) -> Vec<TrialDetail> {
    let legacy_separator = "=".repeat(80);
    let blocks: Vec<&str> = if text.contains(BLOCK_SEPARATOR) {
        text.split(BLOCK_SEPARATOR).collect()
    } else {
        text.split(legacy_separator.as_str()).collect()
    };

    let mut seen = HashSet::new();
    blocks
        .into_iter()
        .filter_map(parse_block)
        .filter(|trial| {
            let first = seen.insert(trial.trial_id.clone());
            if !first {
                warn!(trial_id = %trial.trial_id, "Skipping duplicate trial block");
            }
            first
        })
        .collect()
}

fn parse_block(block: &str) -> Option<TrialDetail> {
    let trial_id = TRIAL_ID_RE.captures(block)?.get(1)?.as_str().to_string();

    let trial_name = NAME_RE
        .captures(block)
        .or_else(|| LEGACY_NAME_RE.captures(block))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let contact_info = CONTACT_RE
        .captures(block)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| CONTACT_NOT_AVAILABLE.to_string());

    Some(TrialDetail {
        trial_id,
        trial_name,
        contact_info,
        full_text: block.trim().to_string(),
    })
}

#[async_trait]
impl TrialSource for StaticCorpusSource {
    fn name(&self) -> &str {
        "static_corpus"
    }

    /// Every parsed trial, regardless of conditions. The evaluator does the filtering.
    async fn search(
        &self,
        conditions: &[String],
        _limit: usize,
    ) -> Result<Vec<String>, TrialSourceError> {
        debug!(
            conditions = ?conditions,
            trials = self.trials.len(),
            "Static corpus returns all trials"
        );
        Ok(self.trials.iter().map(|t| t.trial_id.clone()).collect())
    }

    async fn fetch(&self, trial_id: &str) -> Result<Option<TrialDetail>, TrialSourceError> {
        Ok(self.trials.iter().find(|t| t.trial_id == trial_id).cloned())
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            source: self.name().to_string(),
            online: true,
            detail: format!("{} trials loaded", self.trials.len()),
            latency_ms: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CORPUS: &str = "TRIAL ID: T1
NAME: Test Trial
CONTACT: Dr. Who, 555-0100
Conditions: breast cancer, stage II
---
Some header text without an id
---
TRIAL ID: T2
Trial Name: Legacy Named Trial
Eligibility: adults 18+
";

    #[test]
    fn test_parse_dash_separated() {
        let trials = parse_corpus(CORPUS);
        assert_eq!(trials.len(), 2);

        assert_eq!(trials[0].trial_id, "T1");
        assert_eq!(trials[0].trial_name, "Test Trial");
        assert_eq!(trials[0].contact_info, "Dr. Who, 555-0100");
        assert!(trials[0].full_text.starts_with("TRIAL ID: T1"));
        assert!(trials[0].full_text.contains("breast cancer, stage II"));

        assert_eq!(trials[1].trial_id, "T2");
        assert_eq!(trials[1].trial_name, "Legacy Named Trial");
        assert_eq!(trials[1].contact_info, CONTACT_NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_legacy_equals_separator() {
        let sep = "=".repeat(80);
        let text = format!(
            "{sep}\nTrial ID: NCT001\nTrial Name: First\n\
             {sep}\nTRIAL ID: NCT002\nNAME: Second\n{sep}\n"
        );
        let trials = parse_corpus(&text);
        let ids: Vec<&str> = trials.iter().map(|t| t.trial_id.as_str()).collect();
        assert_eq!(ids, vec!["NCT001", "NCT002"]);
        assert_eq!(trials[0].trial_name, "First");
    }

    #[test]
    fn test_missing_name_defaults_to_unknown() {
        let trials = parse_corpus("TRIAL ID: X9\nsummary only");
        assert_eq!(trials.len(), 1);
        assert_eq!(trials[0].trial_name, "Unknown");
    }

    #[tokio::test]
    async fn test_duplicate_trial_id_keeps_first_block() {
        let source = StaticCorpusSource::from_text(
            "TRIAL ID: T1\nNAME: First\n---\n\
             TRIAL ID: T2\nNAME: Other\n---\n\
             TRIAL ID: T1\nNAME: Second",
        );
        assert_eq!(source.trials().len(), 2);

        let ids = source.search(&[], 10).await.unwrap();
        assert_eq!(ids, vec!["T1".to_string(), "T2".to_string()]);
        let detail = source.fetch("T1").await.unwrap().unwrap();
        assert_eq!(detail.trial_name, "First");
    }

    #[test]
    fn test_empty_corpus() {
        assert!(parse_corpus("").is_empty());
        assert!(parse_corpus("nothing to see\n---\nstill nothing").is_empty());
    }

    #[tokio::test]
    async fn test_search_ignores_conditions_and_fetch_by_id() {
        let source = StaticCorpusSource::from_text(CORPUS);
        let ids = source
            .search(&["unrelated".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(ids, vec!["T1".to_string(), "T2".to_string()]);

        let detail = source.fetch("T2").await.unwrap().unwrap();
        assert_eq!(detail.trial_name, "Legacy Named Trial");
        assert!(source.fetch("T404").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_from_path_and_health() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", CORPUS).unwrap();

        let source = StaticCorpusSource::from_path(file.path()).unwrap();
        let health = source.health().await;
        assert!(health.online);
        assert_eq!(health.detail, "2 trials loaded");
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = StaticCorpusSource::from_path(Path::new("/nonexistent/trials.txt")).unwrap_err();
        assert!(matches!(err, TrialSourceError::CorpusRead { .. }));
    }
}
