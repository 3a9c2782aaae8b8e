use ragent_core::{RagentError, RagentResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which chat completion service to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// The public OpenAI API.
    #[default]
    OpenAi,
    /// Azure OpenAI. `api_base_url` holds the resource endpoint and
    /// `model_id` the deployment name.
    Azure,
}

/// Completion model settings, the `[model]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Service hosting the model.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model name (OpenAI) or deployment name (Azure).
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// API key sent with every request.
    #[serde(default)]
    pub api_key: String,
    /// Base URL for OpenAI, or the resource endpoint for Azure.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on generated tokens per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Deadline for one completion call, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_model_id() -> String {
    "gpt-4-turbo-preview".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model_id: default_model_id(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelConfig {
    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        match (&self.api_base_url, self.provider) {
            (Some(url), _) => url.trim_end_matches('/'),
            (None, LlmProvider::OpenAi) => "https://api.openai.com",
            (None, LlmProvider::Azure) => "",
        }
    }

    /// Full chat completions endpoint for the provider.
    pub fn chat_url(&self) -> String {
        match self.provider {
            LlmProvider::OpenAi => format!("{}/v1/chat/completions", self.base_url()),
            LlmProvider::Azure => format!("{}/openai/v1/chat/completions", self.base_url()),
        }
    }

    /// The per-call deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Reject settings that cannot reach any backend.
    pub fn validate(&self) -> RagentResult<()> {
        match self.provider {
            LlmProvider::OpenAi if self.api_key.is_empty() => Err(RagentError::Config(
                "OpenAI provider requires an API key (OPENAI_API_KEY)".to_string(),
            )),
            LlmProvider::Azure if self.base_url().is_empty() => Err(RagentError::Config(
                "Azure provider requires an endpoint (AZURE_OPENAI_ENDPOINT)".to_string(),
            )),
            LlmProvider::Azure if self.api_key.is_empty() => Err(RagentError::Config(
                "Azure endpoint is set but AZURE_OPENAI_API_KEY is missing".to_string(),
            )),
            _ if self.model_id.is_empty() => {
                Err(RagentError::Config("model_id must not be empty".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: ModelConfig = toml::from_str("").unwrap();
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.model_id, "gpt-4-turbo-preview");
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_provider_serialization() {
        assert_eq!(serde_json::to_string(&LlmProvider::Azure).unwrap(), "\"azure\"");
        let provider: LlmProvider = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(provider, LlmProvider::OpenAi);
    }

    #[test]
    fn test_chat_urls() {
        let openai = ModelConfig::default();
        assert_eq!(openai.chat_url(), "https://api.openai.com/v1/chat/completions");

        let azure = ModelConfig {
            provider: LlmProvider::Azure,
            api_base_url: Some("https://acme.openai.azure.com/".to_string()),
            ..ModelConfig::default()
        };
        assert_eq!(
            azure.chat_url(),
            "https://acme.openai.azure.com/openai/v1/chat/completions"
        );
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(ModelConfig::default().validate().is_err());

        let openai = ModelConfig {
            api_key: "sk-test".to_string(),
            ..ModelConfig::default()
        };
        assert!(openai.validate().is_ok());

        let azure_without_key = ModelConfig {
            provider: LlmProvider::Azure,
            api_base_url: Some("https://acme.openai.azure.com".to_string()),
            ..ModelConfig::default()
        };
        assert!(matches!(
            azure_without_key.validate(),
            Err(RagentError::Config(_))
        ));

        let azure_without_endpoint = ModelConfig {
            provider: LlmProvider::Azure,
            api_key: "key".to_string(),
            ..ModelConfig::default()
        };
        assert!(azure_without_endpoint.validate().is_err());
    }
}
