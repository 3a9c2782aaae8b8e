use anyhow::Context;
use ragent_agent::{LlmProvider, ModelConfig};
use ragent_core::{RagentError, RagentResult};
use ragent_gateway::ServerConfig;
use ragent_memory::{EmbeddingConfig, EmbeddingProviderKind, TextChunker};
use ragent_session::SessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// A deployed service.
    Production,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Compact human-readable lines.
    Text,
}

/// Document and index locations plus retrieval parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/vector_store")
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/documents")
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_top_k() -> usize {
    3
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            documents_dir: default_documents_dir(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            top_k: default_top_k(),
        }
    }
}

/// Contents of `ragent.toml`, after environment overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagentConfig {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RagentConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            model: ModelConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            session: SessionConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl RagentConfig {
    /// Read `path` (defaults if it does not exist), apply the process
    /// environment, and validate.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = match tokio::fs::read_to_string(path).await {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("Invalid config file '{}'", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to read config file '{}': {e}",
                    path.display()
                ))
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials and model names from the environment.
    ///
    /// An Azure endpoint switches the completion backend to Azure. Empty
    /// values count as unset.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let azure_endpoint = var("AZURE_OPENAI_ENDPOINT");
        let azure_key = var("AZURE_OPENAI_API_KEY");
        let openai_key = var("OPENAI_API_KEY");

        if let Some(endpoint) = azure_endpoint.clone() {
            self.model.provider = LlmProvider::Azure;
            self.model.api_base_url = Some(endpoint);
            if let Some(key) = azure_key.clone() {
                self.model.api_key = key;
            }
            if let Some(deployment) = var("AZURE_OPENAI_DEPLOYMENT_NAME") {
                self.model.model_id = deployment;
            } else if self.model.model_id == DEFAULT_OPENAI_MODEL {
                self.model.model_id = DEFAULT_AZURE_DEPLOYMENT.to_string();
            }
        } else {
            if let Some(key) = openai_key.clone() {
                self.model.api_key = key;
            }
            if let Some(model) = var("OPENAI_MODEL") {
                self.model.model_id = model;
            }
        }

        match self.embedding.provider {
            EmbeddingProviderKind::Local => {}
            EmbeddingProviderKind::OpenAi => {
                if let Some(key) = openai_key {
                    self.embedding.api_key = key;
                }
                if let Some(model) = var("OPENAI_EMBEDDING_MODEL") {
                    self.embedding.model = model;
                }
            }
            EmbeddingProviderKind::Azure => {
                if azure_endpoint.is_some() {
                    self.embedding.api_base_url = azure_endpoint;
                }
                if let Some(key) = azure_key {
                    self.embedding.api_key = key;
                }
                if let Some(deployment) = var("AZURE_OPENAI_EMBEDDINGS_DEPLOYMENT") {
                    self.embedding.model = deployment;
                }
            }
        }

        if let Some(level) = var("RAGENT_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Refuse configurations the service cannot run with.
    pub fn validate(&self) -> RagentResult<()> {
        self.model.validate()?;
        TextChunker::new(self.index.chunk_size, self.index.chunk_overlap)?;
        if self.index.top_k == 0 {
            return Err(RagentError::Config("index.top_k must be at least 1".to_string()));
        }
        if self.session.max_history == 0 {
            return Err(RagentError::Config(
                "session.max_history must be at least 1".to_string(),
            ));
        }
        if self.session.ttl_secs == 0 {
            return Err(RagentError::Config("session.ttl_secs must be at least 1".to_string()));
        }
        if self.embedding.provider != EmbeddingProviderKind::Local && self.embedding.api_key.is_empty()
        {
            return Err(RagentError::Config(
                "remote embeddings require an API key".to_string(),
            ));
        }
        Ok(())
    }

    /// `log_level` as a tracing filter directive.
    pub fn log_directive(&self) -> String {
        match self.log_level.to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            "critical" => "error".to_string(),
            other => other.to_string(),
        }
    }
}
