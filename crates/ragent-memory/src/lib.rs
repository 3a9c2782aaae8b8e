//! Document memory for Ragent: chunking, embedding, vector search, ingestion.
//!
//! Raw documents flow through [`TextChunker`] into [`Chunk`]s, are embedded
//! by an [`EmbeddingProvider`], and land in a [`VectorIndex`]. At query time
//! the [`DocumentRetriever`] embeds the query and returns the nearest chunks.
//!
//! # Main types
//!
//! - [`TextChunker`] — Boundary-aware overlapping text splitter.
//! - [`VectorIndex`] — Exact L2 nearest-neighbour index with persistence.
//! - [`EmbeddingProvider`] — Trait for text embedders (local and HTTP).
//! - [`Ingestor`] — Loads a document directory into the shared index.
//! - [`DocumentRetriever`] — Query-time retrieval over the shared index.

/// Boundary-aware overlapping text chunking.
pub mod chunking;
/// Embedding provider trait, local and HTTP implementations.
pub mod embedding;
/// Exact nearest-neighbour vector index.
pub mod index;
/// Directory ingestion and index initialisation.
pub mod ingest;
/// Query-time retrieval.
pub mod retriever;

pub use chunking::{Chunk, TextChunker};
pub use embedding::{
    build_embedder, EmbeddingConfig, EmbeddingProvider, EmbeddingProviderKind, HttpEmbedding,
    LocalEmbedding,
};
pub use index::{IndexEntry, SearchResult, SharedIndex, VectorIndex};
pub use ingest::{load_documents, IndexOrigin, Ingestor};
pub use retriever::{DocumentRetriever, RetrievedChunk};
