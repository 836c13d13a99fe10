//! PHI de-identification client.
//!
//! Patient text is redacted by an external service before it enters the
//! matching pipeline. Only `processed_text` is consumed downstream.

mod skyflow;

pub use skyflow::SkyflowDeidentifier;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::DeidentifyConfig;

/// Redacted text plus what was redacted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeidentifiedText {
    #[serde(default)]
    pub processed_text: String,
    #[serde(default)]
    pub entities: Vec<DetectedEntity>,
}

/// One redacted entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectedEntity {
    #[serde(default)]
    pub entity_type: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub token: String,
}

/// Errors from de-identification.
#[derive(Debug, Error)]
pub enum DeidentifyError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("De-identification service error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl DeidentifyError {
    /// HTTP status to surface to callers.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            DeidentifyError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Redacts PHI from free text.
#[async_trait]
pub trait Deidentifier: Send + Sync {
    /// Name of this service for logging.
    fn name(&self) -> &str;

    async fn deidentify(&self, text: &str) -> Result<DeidentifiedText, DeidentifyError>;
}

/// Build the configured de-identifier, if any.
pub fn create_deidentifier(config: Option<&DeidentifyConfig>) -> Option<Arc<dyn Deidentifier>> {
    config.map(|c| Arc::new(SkyflowDeidentifier::new(c)) as Arc<dyn Deidentifier>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deidentified_text_tolerates_missing_entities() {
        let parsed: DeidentifiedText =
            serde_json::from_str(r#"{"processed_text": "[NAME_1] has asthma"}"#).unwrap();
        assert_eq!(parsed.processed_text, "[NAME_1] has asthma");
        assert!(parsed.entities.is_empty());
    }

    #[test]
    fn test_missing_processed_text_is_empty() {
        let parsed: DeidentifiedText = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.processed_text, "");
    }

    #[test]
    fn test_upstream_status() {
        let err = DeidentifyError::Status {
            status: 401,
            body: "unauthorized".to_string(),
        };
        assert_eq!(err.upstream_status(), Some(401));
        assert_eq!(DeidentifyError::Timeout.upstream_status(), None);
    }

    #[test]
    fn test_create_deidentifier_optional() {
        assert!(create_deidentifier(None).is_none());
    }
}
