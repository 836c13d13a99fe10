//! Skyflow Detect `deidentify/string` client.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DeidentifiedText, Deidentifier, DeidentifyError};
use crate::config::DeidentifyConfig;
use crate::metrics;

/// Client for the Skyflow de-identification endpoint.
pub struct SkyflowDeidentifier {
    client: reqwest::Client,
    url: String,
    vault_id: String,
    bearer_token: String,
    entity_types: Vec<String>,
    token_type: String,
    timeout: Duration,
}

impl SkyflowDeidentifier {
    pub fn new(config: &DeidentifyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.url.clone(),
            vault_id: config.vault_id.clone(),
            bearer_token: config.bearer_token.clone(),
            entity_types: config.entity_types.clone(),
            token_type: config.token_type.clone(),
            timeout: Duration::from_secs(u64::from(config.timeout_secs)),
        }
    }
}

#[derive(Debug, Serialize)]
struct DeidentifyRequest<'a> {
    text: &'a str,
    vault_id: &'a str,
    entity_types: &'a [String],
    token_type: TokenType<'a>,
}

#[derive(Debug, Serialize)]
struct TokenType<'a> {
    default: &'a str,
}

#[async_trait]
impl Deidentifier for SkyflowDeidentifier {
    fn name(&self) -> &str {
        "skyflow"
    }

    async fn deidentify(&self, text: &str) -> Result<DeidentifiedText, DeidentifyError> {
        let request = DeidentifyRequest {
            text,
            vault_id: &self.vault_id,
            entity_types: &self.entity_types,
            token_type: TokenType {
                default: &self.token_type,
            },
        };

        let result = async {
            let response = self
                .client
                .post(&self.url)
                .timeout(self.timeout)
                .bearer_auth(&self.bearer_token)
                .json(&request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        DeidentifyError::Timeout
                    } else {
                        DeidentifyError::ConnectionFailed(e.to_string())
                    }
                })?;

            let status = response.status().as_u16();
            if status != 200 {
                let body = response.text().await.unwrap_or_default();
                return Err(DeidentifyError::Status { status, body });
            }

            response
                .json::<DeidentifiedText>()
                .await
                .map_err(|e| DeidentifyError::Decode(e.to_string()))
        }
        .await;

        match &result {
            Ok(out) => {
                metrics::DEIDENTIFY_REQUESTS.with_label_values(&["success"]).inc();
                debug!(entities = out.entities.len(), "De-identified patient text");
            }
            Err(e) => {
                metrics::DEIDENTIFY_REQUESTS.with_label_values(&["error"]).inc();
                warn!(error = %e, "De-identification failed");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_entity_types;
    use mockito::{Matcher, Server};

    fn config(url: String) -> DeidentifyConfig {
        DeidentifyConfig {
            url,
            vault_id: "vault-1".to_string(),
            bearer_token: "token-abc".to_string(),
            entity_types: default_entity_types(),
            token_type: "vault_token".to_string(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn test_deidentify_request_shape() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/v1/detect/deidentify/string")
            .match_header("authorization", "Bearer token-abc")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "text": "John Doe, DOB 01/02/1970, has asthma",
                "vault_id": "vault-1",
                "token_type": {"default": "vault_token"},
                "entity_types": [
                    "name", "phone_number", "account_number", "ssn", "dob",
                    "location_address_street", "healthcare_number"
                ]
            })))
            .with_status(200)
            .with_body(
                r#"{"processed_text":"[NAME_1], DOB [DOB_1], has asthma","entities":[{"entity_type":"name","value":"John Doe","token":"NAME_1"}]}"#,
            )
            .create_async()
            .await;

        let client = SkyflowDeidentifier::new(&config(format!(
            "{}/v1/detect/deidentify/string",
            server.url()
        )));
        let out = client
            .deidentify("John Doe, DOB 01/02/1970, has asthma")
            .await
            .unwrap();
        assert_eq!(out.processed_text, "[NAME_1], DOB [DOB_1], has asthma");
        assert_eq!(out.entities[0].entity_type, "name");
    }

    #[tokio::test]
    async fn test_deidentify_upstream_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/")
            .with_status(401)
            .with_body("token expired")
            .create_async()
            .await;

        let client = SkyflowDeidentifier::new(&config(server.url()));
        let err = client.deidentify("text").await.unwrap_err();
        assert_eq!(err.upstream_status(), Some(401));
        assert!(err.to_string().contains("token expired"));
    }
}
