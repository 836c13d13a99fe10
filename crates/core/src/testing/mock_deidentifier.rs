//! Mock de-identifier for testing.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::deidentify::{DeidentifiedText, Deidentifier, DeidentifyError, DetectedEntity};

/// Mock implementation of the Deidentifier trait.
///
/// Replaces each configured literal with a `[TOKEN]` placeholder.
#[derive(Debug, Default)]
pub struct MockDeidentifier {
    replacements: Vec<(String, String)>,
    upstream_status: Option<u16>,
    inputs: Mutex<Vec<String>>,
}

impl MockDeidentifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redact `value` as `token`.
    pub fn redacting(mut self, value: &str, token: &str) -> Self {
        self.replacements.push((value.to_string(), token.to_string()));
        self
    }

    /// Fail every call with this upstream HTTP status.
    pub fn failing_with(mut self, status: u16) -> Self {
        self.upstream_status = Some(status);
        self
    }

    /// Texts received so far.
    pub fn recorded_inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Deidentifier for MockDeidentifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn deidentify(&self, text: &str) -> Result<DeidentifiedText, DeidentifyError> {
        self.inputs.lock().unwrap().push(text.to_string());

        if let Some(status) = self.upstream_status {
            return Err(DeidentifyError::Status {
                status,
                body: "mock de-identification failure".to_string(),
            });
        }

        let mut processed = text.to_string();
        let mut entities = Vec::new();
        for (value, token) in &self.replacements {
            if processed.contains(value.as_str()) {
                processed = processed.replace(value.as_str(), &format!("[{}]", token));
                entities.push(DetectedEntity {
                    entity_type: "name".to_string(),
                    value: value.clone(),
                    token: token.clone(),
                });
            }
        }

        Ok(DeidentifiedText {
            processed_text: processed,
            entities,
        })
    }
}
