use chrono::{DateTime, Utc};
use std::sync::Arc;
use trialmatch_core::{Config, Deidentifier, SanitizedConfig, TrialMatcher};

/// Shared application state
pub struct AppState {
    config: Config,
    matcher: Arc<TrialMatcher>,
    deidentifier: Option<Arc<dyn Deidentifier>>,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        config: Config,
        matcher: Arc<TrialMatcher>,
        deidentifier: Option<Arc<dyn Deidentifier>>,
    ) -> Self {
        Self {
            config,
            matcher,
            deidentifier,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn matcher(&self) -> Arc<TrialMatcher> {
        Arc::clone(&self.matcher)
    }

    pub fn deidentifier(&self) -> Option<&Arc<dyn Deidentifier>> {
        self.deidentifier.as_ref()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}
