//! Mock trial source for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::trials::{SourceHealth, TrialDetail, TrialSource, TrialSourceError};

/// Mock implementation of the TrialSource trait.
///
/// `search` returns every configured ID in insertion order, ignoring the
/// conditions. IDs added with [`with_missing_trial`](Self::with_missing_trial)
/// are listed by search but unknown to fetch; IDs added with
/// [`with_fetch_error`](Self::with_fetch_error) are listed but fail to fetch.
#[derive(Debug, Default)]
pub struct MockTrialSource {
    ids: Vec<String>,
    trials: Vec<TrialDetail>,
    fetch_errors: Vec<String>,
    search_error: bool,
    offline: bool,
    searches: Mutex<Vec<(Vec<String>, usize)>>,
    fetches: Mutex<Vec<String>>,
}

impl MockTrialSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trial that search lists and fetch returns.
    pub fn with_trial(mut self, trial: TrialDetail) -> Self {
        self.ids.push(trial.trial_id.clone());
        self.trials.push(trial);
        self
    }

    /// Add an ID that search lists but fetch does not know.
    pub fn with_missing_trial(mut self, trial_id: &str) -> Self {
        self.ids.push(trial_id.to_string());
        self
    }

    /// Add an ID that search lists but whose fetch fails with a transport error.
    pub fn with_fetch_error(mut self, trial_id: &str) -> Self {
        self.ids.push(trial_id.to_string());
        self.fetch_errors.push(trial_id.to_string());
        self
    }

    /// Make every search fail.
    pub fn with_search_error(mut self) -> Self {
        self.search_error = true;
        self
    }

    /// Report the source as offline.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    /// `(conditions, limit)` of each search, in order.
    pub fn recorded_searches(&self) -> Vec<(Vec<String>, usize)> {
        self.searches.lock().unwrap().clone()
    }

    /// IDs fetched so far, in order.
    pub fn recorded_fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrialSource for MockTrialSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(
        &self,
        conditions: &[String],
        limit: usize,
    ) -> Result<Vec<String>, TrialSourceError> {
        self.searches
            .lock()
            .unwrap()
            .push((conditions.to_vec(), limit));
        if self.search_error {
            return Err(TrialSourceError::ConnectionFailed(
                "mock search failure".to_string(),
            ));
        }
        Ok(self.ids.clone())
    }

    async fn fetch(&self, trial_id: &str) -> Result<Option<TrialDetail>, TrialSourceError> {
        self.fetches.lock().unwrap().push(trial_id.to_string());
        if self.fetch_errors.iter().any(|id| id == trial_id) {
            return Err(TrialSourceError::Status {
                status: 502,
                body: "mock fetch failure".to_string(),
            });
        }
        Ok(self.trials.iter().find(|t| t.trial_id == trial_id).cloned())
    }

    async fn health(&self) -> SourceHealth {
        SourceHealth {
            source: "mock".to_string(),
            online: !self.offline,
            detail: if self.offline {
                "mock offline".to_string()
            } else {
                format!("{} trials loaded", self.trials.len())
            },
            latency_ms: None,
        }
    }
}
