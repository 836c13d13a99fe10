//! Oracle and matching pipeline configuration types.

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Anthropic Claude API.
    #[default]
    Anthropic,
    /// Local Ollama instance.
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Ollama => "ollama",
        }
    }
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name/identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key. Falls back to `ANTHROPIC_API_KEY` when loaded from a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Custom API base URL (for proxies or self-hosted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u32,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_llm_timeout() -> u32 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            api_key: None,
            api_base: None,
            timeout_secs: default_llm_timeout(),
        }
    }
}

impl LlmConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.model.trim().is_empty() {
            return Err("llm.model cannot be empty".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("llm.timeout_secs must be greater than 0".to_string());
        }
        // Ollama runs locally without a key
        if self.provider == LlmProvider::Anthropic
            && !self.api_key.as_ref().is_some_and(|k| !k.trim().is_empty())
            && self.api_base.is_none()
        {
            return Err(
                "llm provider anthropic requires api_key (or ANTHROPIC_API_KEY) or api_base"
                    .to_string(),
            );
        }
        Ok(())
    }
}

/// Matching pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Result count used when a caller does not supply one.
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    /// Candidates requested from the source per wanted result.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
    /// Hard ceiling on trials fetched and evaluated in one run.
    #[serde(default = "default_max_evaluations")]
    pub max_evaluations: usize,
    /// Search term used when no conditions could be extracted.
    #[serde(default = "default_fallback_condition")]
    pub fallback_condition: String,
    #[serde(default = "default_extraction_max_tokens")]
    pub extraction_max_tokens: u32,
    #[serde(default = "default_extraction_temperature")]
    pub extraction_temperature: f32,
    #[serde(default = "default_evaluation_max_tokens")]
    pub evaluation_max_tokens: u32,
    #[serde(default = "default_evaluation_temperature")]
    pub evaluation_temperature: f32,
}

fn default_max_results() -> usize {
    10
}

fn default_candidate_multiplier() -> usize {
    2
}

fn default_max_evaluations() -> usize {
    40
}

fn default_fallback_condition() -> String {
    "clinical trial".to_string()
}

fn default_extraction_max_tokens() -> u32 {
    500
}

fn default_extraction_temperature() -> f32 {
    0.1
}

fn default_evaluation_max_tokens() -> u32 {
    2000
}

fn default_evaluation_temperature() -> f32 {
    0.3
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            default_max_results: default_max_results(),
            candidate_multiplier: default_candidate_multiplier(),
            max_evaluations: default_max_evaluations(),
            fallback_condition: default_fallback_condition(),
            extraction_max_tokens: default_extraction_max_tokens(),
            extraction_temperature: default_extraction_temperature(),
            evaluation_max_tokens: default_evaluation_max_tokens(),
            evaluation_temperature: default_evaluation_temperature(),
        }
    }
}

impl MatcherConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_max_results == 0 {
            return Err("matcher.default_max_results must be greater than 0".to_string());
        }
        if self.max_evaluations == 0 {
            return Err("matcher.max_evaluations must be greater than 0".to_string());
        }
        if self.candidate_multiplier == 0 {
            return Err("matcher.candidate_multiplier must be greater than 0".to_string());
        }
        if self.fallback_condition.trim().is_empty() {
            return Err("matcher.fallback_condition cannot be empty".to_string());
        }
        for (name, value) in [
            ("extraction_temperature", self.extraction_temperature),
            ("evaluation_temperature", self.evaluation_temperature),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!(
                    "matcher.{} must be between 0.0 and 1.0, got {}",
                    name, value
                ));
            }
        }
        Ok(())
    }

    /// Number of candidates to request for a run wanting `max_results` matches.
    pub fn candidate_limit(&self, max_results: usize) -> usize {
        max_results
            .saturating_mul(self.candidate_multiplier)
            .min(self.max_evaluations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matcher_config_valid() {
        let config = MatcherConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fallback_condition, "clinical trial");
        assert_eq!(config.extraction_max_tokens, 500);
        assert_eq!(config.evaluation_max_tokens, 2000);
    }

    #[test]
    fn test_candidate_limit_respects_ceiling() {
        let config = MatcherConfig {
            max_evaluations: 15,
            ..Default::default()
        };
        assert_eq!(config.candidate_limit(5), 10);
        assert_eq!(config.candidate_limit(10), 15);
        assert_eq!(config.candidate_limit(0), 0);
    }

    #[test]
    fn test_matcher_config_zero_ceiling_invalid() {
        let config = MatcherConfig {
            max_evaluations: 0,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("max_evaluations"));
    }

    #[test]
    fn test_llm_config_requires_key_for_anthropic() {
        let config = LlmConfig::default();
        assert!(config.validate().is_err());

        let with_key = LlmConfig {
            api_key: Some("sk-ant-test".to_string()),
            ..Default::default()
        };
        assert!(with_key.validate().is_ok());

        let with_proxy = LlmConfig {
            api_base: Some("http://proxy.local".to_string()),
            ..Default::default()
        };
        assert!(with_proxy.validate().is_ok());
    }

    #[test]
    fn test_llm_config_ollama_without_key() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_provider_deserialize() {
        let config: LlmConfig = toml::from_str("provider = \"ollama\"").unwrap();
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert_eq!(config.timeout_secs, 60);
    }
}
