//! Dense retrieval over a vector store

use crate::{embed::Embedder, index::VectorStore, Chunk, Result};
use serde::{Deserialize, Serialize};

/// Default number of chunks handed to the generator
pub const DEFAULT_TOP_K: usize = 5;

/// Result of a retrieval operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Similarity score (higher is more relevant)
    pub score: f32,
}

impl RetrievalResult {
    /// Create a new retrieval result
    #[must_use]
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score }
    }
}

/// Retriever that embeds the query and scans a vector store
pub struct DenseRetriever<E: Embedder> {
    store: VectorStore,
    embedder: E,
    top_k: usize,
}

impl<E: Embedder> DenseRetriever<E> {
    /// Create a new dense retriever
    #[must_use]
    pub fn new(store: VectorStore, embedder: E) -> Self {
        Self {
            store,
            embedder,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Set the default result count
    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Default result count
    #[must_use]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Get the vector store
    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Get the vector store mutably
    pub fn store_mut(&mut self) -> &mut VectorStore {
        &mut self.store
    }

    /// Get the embedder
    #[must_use]
    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Embed and index chunks
    pub fn index(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
        let count = chunks.len();
        let embedded = self.embedder.embed_chunks(chunks)?;
        self.store.insert_batch(embedded)?;
        Ok(count)
    }

    /// Retrieve the `top_k` most relevant chunks
    pub fn retrieve(&self, query: &str) -> Result<Vec<RetrievalResult>> {
        self.retrieve_k(query, self.top_k)
    }

    /// Retrieve the `k` most relevant chunks
    pub fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        let query_embedding = self.embedder.embed_query(query)?;
        let results = self.store.search(&query_embedding, k)?;
        tracing::debug!(query, k, hits = results.len(), "dense retrieval");
        Ok(results)
    }

    /// Get the number of indexed chunks
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the retriever is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
