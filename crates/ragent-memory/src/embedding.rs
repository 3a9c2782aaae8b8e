use async_trait::async_trait;
use ragent_core::{RagentError, RagentResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Azure OpenAI API version used for embedding deployments.
const AZURE_API_VERSION: &str = "2024-02-01";

/// Trait for computing text embeddings (vector representations).
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Compute embedding vector for a single text.
    async fn embed(&self, text: &str) -> RagentResult<Vec<f32>>;

    /// Compute embeddings for many texts, `batch_size` at a time.
    ///
    /// The output has the same length and order as `texts`.
    async fn embed_batch(&self, texts: &[String], batch_size: usize) -> RagentResult<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size.max(1)) {
            for text in batch {
                results.push(self.embed(text).await?);
            }
        }
        Ok(results)
    }

    /// Dimension of the embedding vectors produced by this provider.
    fn dimension(&self) -> usize;
}

/// Which embedding backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// In-process hashing embedder, no network.
    #[default]
    Local,
    /// OpenAI `/v1/embeddings`.
    OpenAi,
    /// Azure OpenAI embeddings deployment.
    Azure,
}

/// Embedding settings, the `[embedding]` config section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend that computes embeddings.
    #[serde(default)]
    pub provider: EmbeddingProviderKind,
    /// Model name (OpenAI) or deployment name (Azure).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key for remote providers.
    #[serde(default)]
    pub api_key: String,
    /// Base URL for OpenAI, or the resource endpoint for Azure.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Vector length. Defaults to 384 locally and 1536 for remote models.
    #[serde(default)]
    pub dimension: Option<usize>,
    /// Texts sent per embedding request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Deadline for one embedding request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Local,
            model: default_embedding_model(),
            api_key: String::new(),
            api_base_url: None,
            dimension: None,
            batch_size: default_batch_size(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    /// The effective vector dimension for this configuration.
    pub fn effective_dimension(&self) -> usize {
        self.dimension.unwrap_or(match self.provider {
            EmbeddingProviderKind::Local => 384,
            EmbeddingProviderKind::OpenAi | EmbeddingProviderKind::Azure => 1536,
        })
    }
}

/// Construct the embedder selected by `config`.
pub fn build_embedder(config: &EmbeddingConfig) -> RagentResult<Arc<dyn EmbeddingProvider>> {
    let embedder: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderKind::Local => {
            info!(dimension = config.effective_dimension(), "Initialized local embeddings");
            Arc::new(LocalEmbedding::new(config.effective_dimension()))
        }
        EmbeddingProviderKind::OpenAi | EmbeddingProviderKind::Azure => {
            let embedder = HttpEmbedding::new(config.clone())?;
            info!(model = %config.model, provider = ?config.provider, "Initialized remote embeddings");
            Arc::new(embedder)
        }
    };
    Ok(embedder)
}

/// Local bag-of-words embedding (no external API needed).
/// Uses TF-based sparse-to-dense hashing into a fixed dimension.
pub struct LocalEmbedding {
    dimension: usize,
}

impl LocalEmbedding {
    /// A local embedder producing vectors of `dimension` (at least 1).
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for LocalEmbedding {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed(&self, text: &str) -> RagentResult<Vec<f32>> {
        if text.is_empty() {
            return Err(RagentError::Embedding("Cannot embed empty text".to_string()));
        }

        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 1)
            .collect();

        let mut freq: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *freq.entry(word).or_insert(0.0) += 1.0;
        }

        let total = words.len() as f32;
        if total == 0.0 {
            return Ok(vector);
        }

        // Three hash positions per word spread collisions out.
        for (word, count) in &freq {
            let tf = count / total;
            let hash1 = fnv1a(word.as_bytes()) as usize;
            let hash2 = fnv1a(&[word.as_bytes(), &[1u8]].concat()) as usize;
            let hash3 = fnv1a(&[word.as_bytes(), &[2u8]].concat()) as usize;

            vector[hash1 % self.dimension] += tf;
            vector[hash2 % self.dimension] += tf * 0.7;
            vector[hash3 % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a, stable across runs and platforms.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

/// Embeddings over the OpenAI-compatible HTTP API (OpenAI or Azure).
///
/// Each batch is sent as a single request.
pub struct HttpEmbedding {
    config: EmbeddingConfig,
    dimension: usize,
    http: reqwest::Client,
}

impl HttpEmbedding {
    /// Build a remote embedder. Fails without an API key, or without an endpoint for Azure.
    pub fn new(config: EmbeddingConfig) -> RagentResult<Self> {
        if config.api_key.is_empty() {
            return Err(RagentError::Config(
                "embedding api_key is required for remote embeddings".to_string(),
            ));
        }
        if config.provider == EmbeddingProviderKind::Azure && config.api_base_url.is_none() {
            return Err(RagentError::Config(
                "Azure embeddings require an endpoint (api_base_url)".to_string(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagentError::Http(e.to_string()))?;
        Ok(Self {
            dimension: config.effective_dimension(),
            config,
            http,
        })
    }

    fn url(&self) -> String {
        match self.config.provider {
            EmbeddingProviderKind::Azure => format!(
                "{}/openai/deployments/{}/embeddings?api-version={AZURE_API_VERSION}",
                self.config
                    .api_base_url
                    .as_deref()
                    .unwrap_or_default()
                    .trim_end_matches('/'),
                self.config.model
            ),
            _ => format!(
                "{}/v1/embeddings",
                self.config
                    .api_base_url
                    .as_deref()
                    .unwrap_or("https://api.openai.com")
                    .trim_end_matches('/')
            ),
        }
    }

    async fn request(&self, inputs: &[String]) -> RagentResult<Vec<Vec<f32>>> {
        let mut body = serde_json::json!({ "input": inputs });
        if self.config.provider != EmbeddingProviderKind::Azure {
            body["model"] = serde_json::json!(self.config.model);
        }

        let request = match self.config.provider {
            EmbeddingProviderKind::Azure => self.http.post(self.url()).header("api-key", &self.config.api_key),
            _ => self.http.post(self.url()).bearer_auth(&self.config.api_key),
        };

        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| RagentError::Embedding(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RagentError::Embedding(e.to_string()))?;

        if !status.is_success() {
            return Err(RagentError::Embedding(format!(
                "embeddings API error {status}: {resp_body}"
            )));
        }

        parse_embeddings(&resp_body, inputs.len(), self.dimension)
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedding {
    async fn embed(&self, text: &str) -> RagentResult<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await.map_err(|e| {
            error!(error = %e, "Error generating embedding");
            e
        })?;
        vectors
            .pop()
            .ok_or_else(|| RagentError::Embedding("empty embeddings response".to_string()))
    }

    async fn embed_batch(&self, texts: &[String], batch_size: usize) -> RagentResult<Vec<Vec<f32>>> {
        let batch_size = batch_size.max(1);
        let batches = texts.len().div_ceil(batch_size);
        let mut results = Vec::with_capacity(texts.len());

        for (i, batch) in texts.chunks(batch_size).enumerate() {
            let vectors = self.request(batch).await.map_err(|e| {
                error!(error = %e, batch = i + 1, "Error generating embeddings for batch");
                e
            })?;
            results.extend(vectors);
            info!(batch = i + 1, batches, "Generated embeddings for batch");
        }

        Ok(results)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Pull `data[].embedding` out of an embeddings response, ordered by `index`.
fn parse_embeddings(
    body: &serde_json::Value,
    expected: usize,
    dimension: usize,
) -> RagentResult<Vec<Vec<f32>>> {
    #[derive(Deserialize)]
    struct Item {
        #[serde(default)]
        index: usize,
        embedding: Vec<f32>,
    }

    let data = body
        .get("data")
        .cloned()
        .ok_or_else(|| RagentError::Embedding("response has no `data` field".to_string()))?;
    let mut items: Vec<Item> = serde_json::from_value(data)
        .map_err(|e| RagentError::Embedding(format!("malformed embeddings response: {e}")))?;

    if items.len() != expected {
        return Err(RagentError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            items.len()
        )));
    }
    items.sort_by_key(|item| item.index);

    if let Some(bad) = items.iter().find(|item| item.embedding.len() != dimension) {
        return Err(RagentError::Embedding(format!(
            "embedding dimension {} does not match configured {dimension}",
            bad.embedding.len()
        )));
    }

    Ok(items.into_iter().map(|item| item.embedding).collect())
}
