//! Trial sources: where candidate trials come from.
//!
//! Two backends implement [`TrialSource`]:
//! - [`StaticCorpusSource`]: a flat text file parsed once at construction
//! - [`ClinicalTrialsMcpSource`]: ClinicalTrials.gov behind an MCP tool-call endpoint

mod clinicaltrials_mcp;
mod event_stream;
mod static_corpus;
mod types;

pub use clinicaltrials_mcp::{classify_health_status, ClinicalTrialsMcpSource};
pub use event_stream::{decode_tool_payload, find_data_line};
pub use static_corpus::{parse_corpus, StaticCorpusSource};
pub use types::{SourceHealth, TrialDetail, TrialSource, TrialSourceError, CONTACT_NOT_AVAILABLE};

use std::sync::Arc;

use crate::config::{TrialSourceBackend, TrialSourceConfig};

/// Build the configured trial source.
///
/// The static corpus is read here, so an unreadable file fails construction.
pub fn create_trial_source(
    config: &TrialSourceConfig,
) -> Result<Arc<dyn TrialSource>, TrialSourceError> {
    match config.backend {
        TrialSourceBackend::StaticCorpus => {
            let corpus = config.static_corpus.as_ref().ok_or_else(|| {
                TrialSourceError::CorpusRead {
                    path: String::new(),
                    reason: "[trial_source.static_corpus] section missing".to_string(),
                }
            })?;
            Ok(Arc::new(StaticCorpusSource::from_path(&corpus.path)?))
        }
        TrialSourceBackend::ClinicalTrialsMcp => {
            let mcp = config.clinical_trials_mcp.clone().unwrap_or_default();
            Ok(Arc::new(ClinicalTrialsMcpSource::new(&mcp)))
        }
    }
}
