use crate::embedding::EmbeddingProvider;
use crate::index::SharedIndex;
use ragent_core::RagentResult;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// A chunk returned for a query, flattened for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    /// Chunk text.
    pub content: String,
    /// Source document id.
    pub source: String,
    /// Position of the chunk in its document.
    pub chunk_index: usize,
    /// Squared L2 distance to the query.
    pub distance: f32,
}

/// Query-time access to the shared index.
#[derive(Clone)]
pub struct DocumentRetriever {
    index: SharedIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    top_k: usize,
}

impl DocumentRetriever {
    /// Create a retriever returning `top_k` chunks by default.
    pub fn new(index: SharedIndex, embedder: Arc<dyn EmbeddingProvider>, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k: top_k.max(1),
        }
    }

    /// Embed `query` and return its nearest chunks, closest first.
    ///
    /// `k = None` uses the configured default. An uninitialized index
    /// returns no results without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: Option<usize>) -> RagentResult<Vec<RetrievedChunk>> {
        if !self.is_initialized().await {
            debug!("Retrieval skipped: vector index is empty");
            return Ok(Vec::new());
        }

        let k = k.unwrap_or(self.top_k);
        let query_vector = self.embedder.embed(query).await?;
        let results = self.index.read().await.search(&query_vector, k)?;

        info!(found = results.len(), k, "Retrieved chunks for query");
        Ok(results
            .into_iter()
            .map(|r| RetrievedChunk {
                content: r.chunk.content,
                source: r.chunk.source_id,
                chunk_index: r.chunk.chunk_index,
                distance: r.distance,
            })
            .collect())
    }

    /// True once the index holds documents.
    pub async fn is_initialized(&self) -> bool {
        self.index.read().await.is_initialized()
    }

    /// Number of indexed chunks.
    pub async fn len(&self) -> usize {
        self.index.read().await.len()
    }

    /// Number of chunks returned when no `k` is given.
    pub fn default_k(&self) -> usize {
        self.top_k
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::embedding::LocalEmbedding;
    use crate::index::{IndexEntry, VectorIndex};

    async fn populated() -> DocumentRetriever {
        let embedder = Arc::new(LocalEmbedding::new(64));
        let index = VectorIndex::shared();
        let docs = [
            ("leave.txt", "vacation leave policy days off"),
            ("expenses.txt", "expense reimbursement receipts travel"),
            ("security.txt", "password rotation security badge"),
        ];
        let mut entries = Vec::new();
        for (source, text) in docs {
            let vector = embedder.embed(text).await.unwrap();
            entries.push(IndexEntry::new(
                Chunk {
                    content: text.to_string(),
                    source_id: source.to_string(),
                    chunk_index: 0,
                    total_chunks: 1,
                },
                vector,
            ));
        }
        index.write().await.add(entries).unwrap();
        DocumentRetriever::new(index, embedder, 2)
    }

    #[tokio::test]
    async fn test_retrieve_uses_default_k() {
        let retriever = populated().await;
        let results = retriever.retrieve("leave policy", None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "leave.txt");
        assert!(results[0].distance <= results[1].distance);
    }

    #[tokio::test]
    async fn test_retrieve_explicit_k() {
        let retriever = populated().await;
        assert_eq!(retriever.retrieve("travel", Some(1)).await.unwrap().len(), 1);
        assert_eq!(retriever.retrieve("travel", Some(10)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_retrieve_uninitialized() {
        let retriever =
            DocumentRetriever::new(VectorIndex::shared(), Arc::new(LocalEmbedding::new(8)), 3);
        assert!(retriever.retrieve("anything", None).await.unwrap().is_empty());
        assert!(!retriever.is_initialized().await);
    }
}
