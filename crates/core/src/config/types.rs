use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::matcher::{LlmConfig, LlmProvider, MatcherConfig};

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    pub trial_source: TrialSourceConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub deidentify: Option<DeidentifyConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

/// Trial source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrialSourceConfig {
    /// Which backend supplies candidate trials
    pub backend: TrialSourceBackend,
    /// Flat-file corpus settings (required when backend = "static_corpus")
    #[serde(default)]
    pub static_corpus: Option<StaticCorpusConfig>,
    /// Remote MCP service settings (required when backend = "clinical_trials_mcp")
    #[serde(default)]
    pub clinical_trials_mcp: Option<ClinicalTrialsMcpConfig>,
}

/// Available trial source backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrialSourceBackend {
    StaticCorpus,
    ClinicalTrialsMcp,
}

impl TrialSourceBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrialSourceBackend::StaticCorpus => "static_corpus",
            TrialSourceBackend::ClinicalTrialsMcp => "clinical_trials_mcp",
        }
    }
}

/// Static flat-file corpus configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticCorpusConfig {
    /// Path to the delimiter-separated trials file
    #[serde(default = "default_corpus_path")]
    pub path: PathBuf,
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("clinical_trials.txt")
}

/// ClinicalTrials.gov MCP service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClinicalTrialsMcpConfig {
    /// Service endpoint (the MCP server routes on its base URL)
    #[serde(default = "default_mcp_url")]
    pub url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u32,
    /// Overall status filter passed to list_studies
    #[serde(default = "default_status_filter")]
    pub status_filter: String,
}

impl Default for ClinicalTrialsMcpConfig {
    fn default() -> Self {
        Self {
            url: default_mcp_url(),
            timeout_secs: default_mcp_timeout(),
            status_filter: default_status_filter(),
        }
    }
}

fn default_mcp_url() -> String {
    "https://clinicaltrialsgov-mcp.onrender.com".to_string()
}

fn default_mcp_timeout() -> u32 {
    30
}

fn default_status_filter() -> String {
    "RECRUITING".to_string()
}

/// De-identification service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeidentifyConfig {
    /// Full URL of the deidentify/string endpoint
    pub url: String,
    /// Vault the tokens are issued against
    pub vault_id: String,
    /// Bearer token for the service
    pub bearer_token: String,
    /// Entity categories to redact
    #[serde(default = "default_entity_types")]
    pub entity_types: Vec<String>,
    /// Token type preference applied to every entity
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_deidentify_timeout")]
    pub timeout_secs: u32,
}

pub fn default_entity_types() -> Vec<String> {
    [
        "name",
        "phone_number",
        "account_number",
        "ssn",
        "dob",
        "location_address_street",
        "healthcare_number",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_token_type() -> String {
    "vault_token".to_string()
}

fn default_deidentify_timeout() -> u32 {
    30
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub llm: SanitizedLlmConfig,
    pub trial_source: SanitizedTrialSourceConfig,
    pub matcher: MatcherConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deidentify: Option<SanitizedDeidentifyConfig>,
}

/// Sanitized LLM config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedLlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key_configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedTrialSourceConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_corpus: Option<StaticCorpusConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinical_trials_mcp: Option<ClinicalTrialsMcpConfig>,
}

/// Sanitized de-identification config (bearer token hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDeidentifyConfig {
    pub url: String,
    pub vault_id: String,
    pub bearer_token_configured: bool,
    pub entity_types: Vec<String>,
    pub token_type: String,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            llm: SanitizedLlmConfig {
                provider: config.llm.provider.clone(),
                model: config.llm.model.clone(),
                api_key_configured: config
                    .llm
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                api_base: config.llm.api_base.clone(),
                timeout_secs: config.llm.timeout_secs,
            },
            trial_source: SanitizedTrialSourceConfig {
                backend: config.trial_source.backend.as_str().to_string(),
                static_corpus: config.trial_source.static_corpus.clone(),
                clinical_trials_mcp: config.trial_source.clinical_trials_mcp.clone(),
            },
            matcher: config.matcher.clone(),
            deidentify: config
                .deidentify
                .as_ref()
                .map(|d| SanitizedDeidentifyConfig {
                    url: d.url.clone(),
                    vault_id: d.vault_id.clone(),
                    bearer_token_configured: !d.bearer_token.is_empty(),
                    entity_types: d.entity_types.clone(),
                    token_type: d.token_type.clone(),
                }),
        }
    }
}
