use crate::chunking::{Chunk, TextChunker};
use crate::embedding::EmbeddingProvider;
use crate::index::{IndexEntry, SharedIndex, VectorIndex};
use ragent_core::{RagentError, RagentResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the index contents came from after [`Ingestor::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    /// Restored from previously saved state.
    Loaded,
    /// Built from the documents directory; holds the number of chunks.
    Ingested(usize),
    /// Nothing to load and nothing to ingest.
    Empty,
}

/// Read every `.txt` file in `dir` and chunk it.
///
/// Files are visited in name order. A file that cannot be read is skipped
/// with a warning; a missing directory yields no chunks.
pub async fn load_documents(dir: &Path, chunker: &TextChunker) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "Documents directory not readable");
            return chunks;
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "txt") {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to list directory entry");
                break;
            }
        }
    }
    paths.sort();

    for path in paths {
        let source_id = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        match read_document(&path).await {
            Ok(text) => {
                let doc_chunks = chunker.chunk_document(&source_id, &text);
                info!(source = %source_id, chunks = doc_chunks.len(), "Loaded document");
                chunks.extend(doc_chunks);
            }
            Err(e) => warn!(source = %source_id, error = %e, "Skipping document"),
        }
    }

    info!(total = chunks.len(), "Total chunks loaded");
    chunks
}

async fn read_document(path: &Path) -> RagentResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RagentError::DocumentLoad(format!("{}: {e}", path.display())))
}

/// Builds the shared index from a documents directory.
pub struct Ingestor {
    index: SharedIndex,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: TextChunker,
    batch_size: usize,
}

impl Ingestor {
    /// Create an ingestor that embeds `batch_size` chunks per request.
    pub fn new(
        index: SharedIndex,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: TextChunker,
        batch_size: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            chunker,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed `chunks` and append them to the index.
    ///
    /// Embedding runs before the write lock is taken, so searches keep
    /// running while the embedder is busy.
    pub async fn add_chunks(&self, chunks: Vec<Chunk>) -> RagentResult<usize> {
        if chunks.is_empty() {
            warn!("No chunks to add");
            return Ok(0);
        }

        let entries = self.embed_chunks(chunks).await?;
        let added = entries.len();
        self.index.write().await.add(entries)?;
        Ok(added)
    }

    /// Pair every chunk with its embedding, in order.
    ///
    /// An embedder that returns the wrong number of vectors is an error, so
    /// no chunk is ever dropped silently.
    async fn embed_chunks(&self, chunks: Vec<Chunk>) -> RagentResult<Vec<IndexEntry>> {
        info!(count = chunks.len(), "Generating embeddings");
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts, self.batch_size).await?;
        if vectors.len() != chunks.len() {
            return Err(RagentError::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::new(chunk, vector))
            .collect())
    }

    /// Chunk, embed and index every document in `dir`.
    pub async fn ingest_directory(&self, dir: &Path) -> RagentResult<usize> {
        info!(dir = %dir.display(), "Loading documents");
        let chunks = load_documents(dir, &self.chunker).await;
        self.add_chunks(chunks).await
    }

    /// Restore the index from `store_path`, or build it from `documents_dir`
    /// and save it for the next start.
    pub async fn initialize(&self, documents_dir: &Path, store_path: &Path) -> RagentResult<IndexOrigin> {
        let mut restored = VectorIndex::new();
        if restored.load(store_path).await? {
            *self.index.write().await = restored;
            info!("Vector index loaded from disk");
            return Ok(IndexOrigin::Loaded);
        }

        let added = self.ingest_directory(documents_dir).await?;
        if added == 0 {
            warn!("No documents loaded. Vector index will be empty.");
            return Ok(IndexOrigin::Empty);
        }

        self.index.read().await.save(store_path).await?;
        info!(chunks = added, "Vector index initialized and saved");
        Ok(IndexOrigin::Ingested(added))
    }

    /// Drop the current contents, re-ingest `documents_dir`, and save.
    ///
    /// With no documents to ingest, both the index and the saved state are
    /// left as they were.
    pub async fn rebuild(&self, documents_dir: &Path, store_path: &Path) -> RagentResult<usize> {
        let chunks = load_documents(documents_dir, &self.chunker).await;
        if chunks.is_empty() {
            return Err(RagentError::DocumentLoad(format!(
                "no documents found in {}",
                documents_dir.display()
            )));
        }
        let entries = self.embed_chunks(chunks).await?;

        let mut fresh = VectorIndex::new();
        fresh.add(entries)?;
        let added = fresh.len();
        fresh.save(store_path).await?;

        *self.index.write().await = fresh;
        info!(chunks = added, "Vector index rebuilt");
        Ok(added)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::embedding::LocalEmbedding;

    fn ingestor(index: SharedIndex) -> Ingestor {
        Ingestor::new(
            index,
            Arc::new(LocalEmbedding::new(32)),
            TextChunker::new(50, 10).unwrap(),
            4,
        )
    }

    #[tokio::test]
    async fn test_load_documents_only_txt_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("b.txt"), "bravo document").await.unwrap();
        tokio::fs::write(tmp.path().join("a.txt"), "alpha document").await.unwrap();
        tokio::fs::write(tmp.path().join("notes.md"), "ignored").await.unwrap();

        let chunker = TextChunker::new(100, 10).unwrap();
        let chunks = load_documents(tmp.path(), &chunker).await;
        let sources: Vec<&str> = chunks.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn test_load_documents_missing_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let chunker = TextChunker::new(100, 10).unwrap();
        assert!(load_documents(&tmp.path().join("nope"), &chunker).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_file_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        tokio::fs::write(tmp.path().join("good.txt"), "readable text").await.unwrap();
        tokio::fs::write(tmp.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0xc3])
            .await
            .unwrap();

        let chunker = TextChunker::new(100, 10).unwrap();
        let chunks = load_documents(tmp.path(), &chunker).await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_id, "good.txt");
    }

    #[tokio::test]
    async fn test_initialize_ingests_then_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        let store = tmp.path().join("store");
        tokio::fs::create_dir_all(&docs).await.unwrap();
        tokio::fs::write(docs.join("policy.txt"), "Employees get fifteen days of leave.")
            .await
            .unwrap();

        let first = VectorIndex::shared();
        let origin = ingestor(first.clone()).initialize(&docs, &store).await.unwrap();
        assert_eq!(origin, IndexOrigin::Ingested(1));

        let second = VectorIndex::shared();
        let origin = ingestor(second.clone()).initialize(&docs, &store).await.unwrap();
        assert_eq!(origin, IndexOrigin::Loaded);
        assert_eq!(second.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let index = VectorIndex::shared();
        let origin = ingestor(index.clone())
            .initialize(tmp.path(), &tmp.path().join("store"))
            .await
            .unwrap();
        assert_eq!(origin, IndexOrigin::Empty);
        assert!(!index.read().await.is_initialized());
    }

    /// Embeds normally but loses the last vector of every batch call.
    struct LossyEmbedding(LocalEmbedding);

    #[async_trait::async_trait]
    impl EmbeddingProvider for LossyEmbedding {
        async fn embed(&self, text: &str) -> RagentResult<Vec<f32>> {
            self.0.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String], batch_size: usize) -> RagentResult<Vec<Vec<f32>>> {
            let mut vectors = self.0.embed_batch(texts, batch_size).await?;
            vectors.pop();
            Ok(vectors)
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    #[tokio::test]
    async fn test_short_embedding_batch_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        let store = tmp.path().join("store");
        tokio::fs::create_dir_all(&docs).await.unwrap();
        tokio::fs::write(docs.join("one.txt"), "first document").await.unwrap();
        tokio::fs::write(docs.join("two.txt"), "second document").await.unwrap();

        let index = VectorIndex::shared();
        ingestor(index.clone()).initialize(&docs, &store).await.unwrap();

        let lossy = Ingestor::new(
            index.clone(),
            Arc::new(LossyEmbedding(LocalEmbedding::new(32))),
            TextChunker::new(50, 10).unwrap(),
            4,
        );
        let err = lossy.rebuild(&docs, &store).await.unwrap_err();
        assert!(matches!(err, RagentError::Embedding(_)));
        assert_eq!(index.read().await.len(), 2);

        let err = lossy
            .add_chunks(load_documents(&docs, &TextChunker::new(50, 10).unwrap()).await)
            .await
            .unwrap_err();
        assert!(matches!(err, RagentError::Embedding(_)));
        assert_eq!(index.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rebuild_replaces_contents() {
        let tmp = tempfile::tempdir().unwrap();
        let docs = tmp.path().join("docs");
        let store = tmp.path().join("store");
        tokio::fs::create_dir_all(&docs).await.unwrap();
        tokio::fs::write(docs.join("one.txt"), "first document").await.unwrap();

        let index = VectorIndex::shared();
        let ingest = ingestor(index.clone());
        ingest.initialize(&docs, &store).await.unwrap();

        tokio::fs::write(docs.join("two.txt"), "second document").await.unwrap();
        let added = ingest.rebuild(&docs, &store).await.unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.read().await.len(), 2);
    }
}
