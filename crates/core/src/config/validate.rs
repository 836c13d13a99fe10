use super::{types::Config, ConfigError, TrialSourceBackend};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - The selected trial source backend has its settings section
/// - LLM and matcher settings (see `LlmConfig::validate`, `MatcherConfig::validate`)
/// - De-identification settings, when present
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    match config.trial_source.backend {
        TrialSourceBackend::StaticCorpus if config.trial_source.static_corpus.is_none() => {
            return Err(ConfigError::ValidationError(
                "trial_source.backend = \"static_corpus\" requires [trial_source.static_corpus]"
                    .to_string(),
            ));
        }
        TrialSourceBackend::ClinicalTrialsMcp
            if config.trial_source.clinical_trials_mcp.is_none() =>
        {
            return Err(ConfigError::ValidationError(
                "trial_source.backend = \"clinical_trials_mcp\" requires [trial_source.clinical_trials_mcp]"
                    .to_string(),
            ));
        }
        _ => {}
    }

    if let Some(mcp) = &config.trial_source.clinical_trials_mcp {
        if mcp.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "trial_source.clinical_trials_mcp.url cannot be empty".to_string(),
            ));
        }
    }

    config
        .llm
        .validate()
        .map_err(ConfigError::ValidationError)?;
    config
        .matcher
        .validate()
        .map_err(ConfigError::ValidationError)?;

    if let Some(deid) = &config.deidentify {
        if deid.url.trim().is_empty() || deid.vault_id.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "deidentify.url and deidentify.vault_id are required".to_string(),
            ));
        }
        if deid.entity_types.is_empty() {
            return Err(ConfigError::ValidationError(
                "deidentify.entity_types cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
