use crate::chunking::Chunk;
use ragent_core::{RagentError, RagentResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// File holding the flat vector matrix.
const VECTORS_FILE: &str = "vectors.json";
/// File holding one chunk per line, in row order.
const CHUNKS_FILE: &str = "chunks.jsonl";

/// The process-wide index handle: searches take the read lock, ingestion
/// takes the write lock.
pub type SharedIndex = Arc<RwLock<VectorIndex>>;

/// One chunk paired with its embedding.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// The indexed chunk.
    pub chunk: Chunk,
    /// Its embedding.
    pub vector: Vec<f32>,
}

impl IndexEntry {
    /// Pair a chunk with its embedding.
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// A search hit. Lower distance means more similar.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The matching chunk.
    pub chunk: Chunk,
    /// Squared Euclidean distance to the query.
    pub distance: f32,
}

#[derive(Serialize, Deserialize)]
struct VectorBlob {
    dimension: usize,
    count: usize,
    data: Vec<f32>,
}

/// Exact (brute-force) L2 index over chunk embeddings.
///
/// Vectors are stored row-major in one flat buffer; row `i` belongs to
/// `chunks[i]`. The dimension is fixed by the first non-empty `add` and
/// reset only by [`VectorIndex::clear`].
#[derive(Debug, Default)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// An empty index with no dimension yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh, empty index in the shared handle.
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::new()))
    }

    /// The fixed vector dimension, once established.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True once a successful `add` or `load` has established a dimension.
    pub fn is_initialized(&self) -> bool {
        self.dimension.is_some()
    }

    /// Stored chunks in row order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Append entries in order.
    ///
    /// The whole batch is validated before anything is stored, so a
    /// rejected batch leaves the index untouched.
    pub fn add(&mut self, entries: Vec<IndexEntry>) -> RagentResult<()> {
        let Some(first) = entries.first() else {
            return Ok(());
        };

        let dimension = self.dimension.unwrap_or(first.vector.len());
        if dimension == 0 {
            return Err(RagentError::Index(
                "cannot index zero-length vectors".to_string(),
            ));
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimension) {
            return Err(RagentError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        if self.dimension.is_none() {
            info!(dimension, "Created vector index");
        }
        self.dimension = Some(dimension);
        self.data.reserve(entries.len() * dimension);
        self.chunks.reserve(entries.len());
        let added = entries.len();
        for entry in entries {
            self.data.extend_from_slice(&entry.vector);
            self.chunks.push(entry.chunk);
        }

        info!(added, total = self.chunks.len(), "Added entries to vector index");
        Ok(())
    }

    /// The `k` nearest chunks to `query`, ascending by squared L2 distance.
    ///
    /// An empty index yields no results. Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> RagentResult<Vec<SearchResult>> {
        let Some(dimension) = self.dimension else {
            warn!("Vector index not initialized or empty");
            return Ok(Vec::new());
        };
        if query.len() != dimension {
            return Err(RagentError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let k = k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dimension)
            .map(|row| squared_l2(query, row))
            .enumerate()
            .collect();

        let by_distance =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance);
            scored.truncate(k);
        }
        scored.sort_by(by_distance);

        Ok(scored
            .into_iter()
            .map(|(row, distance)| SearchResult {
                chunk: self.chunks[row].clone(),
                distance,
            })
            .collect())
    }

    /// Drop every entry and forget the dimension.
    pub fn clear(&mut self) {
        self.dimension = None;
        self.data.clear();
        self.chunks.clear();
        info!("Vector index cleared");
    }

    /// Persist vectors and chunk metadata side by side under `dir`.
    ///
    /// An uninitialized index is not written.
    pub async fn save(&self, dir: &Path) -> RagentResult<()> {
        let Some(dimension) = self.dimension else {
            warn!("Cannot save uninitialized vector index");
            return Ok(());
        };

        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| RagentError::Index(format!("Failed to create {}: {e}", dir.display())))?;

        let blob = VectorBlob {
            dimension,
            count: self.chunks.len(),
            data: self.data.clone(),
        };
        let vectors = serde_json::to_vec(&blob)?;

        let mut lines = String::new();
        for chunk in &self.chunks {
            lines.push_str(&serde_json::to_string(chunk)?);
            lines.push('\n');
        }

        write_atomic(&dir.join(VECTORS_FILE), &vectors).await?;
        write_atomic(&dir.join(CHUNKS_FILE), lines.as_bytes()).await?;

        info!(path = %dir.display(), entries = self.chunks.len(), "Vector index saved");
        Ok(())
    }

    /// Restore state written by [`VectorIndex::save`].
    ///
    /// Returns `Ok(false)` and leaves the index untouched when either file is
    /// missing or the pair is unreadable or inconsistent.
    pub async fn load(&mut self, dir: &Path) -> RagentResult<bool> {
        let vectors_path = dir.join(VECTORS_FILE);
        let chunks_path = dir.join(CHUNKS_FILE);

        if !vectors_path.exists() || !chunks_path.exists() {
            info!(path = %dir.display(), "Vector index files not found");
            return Ok(false);
        }

        match read_state(&vectors_path, &chunks_path).await {
            Ok((blob, chunks)) => {
                self.dimension = Some(blob.dimension);
                self.data = blob.data;
                self.chunks = chunks;
                info!(
                    path = %dir.display(),
                    entries = self.chunks.len(),
                    "Vector index loaded"
                );
                Ok(true)
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Failed to load vector index");
                Ok(false)
            }
        }
    }
}

async fn read_state(vectors_path: &Path, chunks_path: &Path) -> RagentResult<(VectorBlob, Vec<Chunk>)> {
    let raw = tokio::fs::read(vectors_path).await?;
    let blob: VectorBlob = serde_json::from_slice(&raw)?;

    // The header counts are untrusted until they agree with the data read.
    if blob.dimension == 0 || blob.count.checked_mul(blob.dimension) != Some(blob.data.len()) {
        return Err(RagentError::Index(format!(
            "inconsistent vectors: count {} of dimension {} does not match {} floats",
            blob.count,
            blob.dimension,
            blob.data.len()
        )));
    }

    let text = tokio::fs::read_to_string(chunks_path).await?;
    let mut chunks = Vec::with_capacity(blob.data.len() / blob.dimension);
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        chunks.push(serde_json::from_str::<Chunk>(line)?);
    }

    if chunks.len() != blob.count {
        return Err(RagentError::Index(format!(
            "inconsistent state: {} vectors for {} chunks",
            blob.count,
            chunks.len()
        )));
    }
    Ok((blob, chunks))
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> RagentResult<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
