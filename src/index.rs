//! Vector store for dense retrieval, with on-disk collections

use crate::{
    embed::{cosine_similarity, dot_product, euclidean_distance},
    retrieve::RetrievalResult,
    Chunk, ChunkId, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// A chunk together with its embedding vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// The chunk (content and metadata)
    pub chunk: Chunk,
    /// Embedding vector
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    /// Pair a chunk with its vector
    #[must_use]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self { chunk, vector }
    }
}

/// Distance metric for vector search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine similarity
    #[default]
    Cosine,
    /// Euclidean distance (scored as negative distance)
    Euclidean,
    /// Dot product
    DotProduct,
}

impl DistanceMetric {
    fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => cosine_similarity(a, b),
            Self::Euclidean => -euclidean_distance(a, b),
            Self::DotProduct => dot_product(a, b),
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    /// Embedding dimension
    pub dimension: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Embedding model the vectors were produced with
    pub model_id: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            metric: DistanceMetric::Cosine,
            model_id: None,
        }
    }
}

/// On-disk layout of one collection
#[derive(Serialize, Deserialize)]
struct PersistedCollection {
    name: String,
    config: VectorStoreConfig,
    records: Vec<EmbeddedChunk>,
}

/// Exact-scan vector store.
///
/// Entries keep insertion order, which also breaks score ties, so search
/// results are deterministic for a fixed store state.
#[derive(Debug, Clone)]
pub struct VectorStore {
    config: VectorStoreConfig,
    entries: Vec<EmbeddedChunk>,
}

impl VectorStore {
    /// Create a new vector store
    #[must_use]
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            config,
            entries: Vec::new(),
        }
    }

    /// Create with default configuration and the given dimension
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self::new(VectorStoreConfig {
            dimension,
            ..Default::default()
        })
    }

    /// Create a store bound to an embedding model
    #[must_use]
    pub fn for_model(dimension: usize, model_id: impl Into<String>) -> Self {
        Self::new(VectorStoreConfig {
            dimension,
            model_id: Some(model_id.into()),
            ..Default::default()
        })
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    /// Insert an embedded chunk
    pub fn insert(&mut self, entry: EmbeddedChunk) -> Result<()> {
        if entry.vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: entry.vector.len(),
            });
        }

        self.entries.push(entry);
        Ok(())
    }

    /// Insert multiple embedded chunks; stops at the first invalid one
    pub fn insert_batch(&mut self, entries: Vec<EmbeddedChunk>) -> Result<()> {
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    /// Add chunks with their vectors (metadata travels with each chunk)
    pub fn add(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<()> {
        if chunks.len() != vectors.len() {
            return Err(Error::InvalidConfig(format!(
                "{} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.config.dimension) {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: bad.len(),
            });
        }

        self.entries.extend(
            chunks
                .into_iter()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector)),
        );
        Ok(())
    }

    /// Search for the `k` most similar chunks, best first
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievalResult>> {
        if query_vector.len() != self.config.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.config.dimension,
                actual: query_vector.len(),
            });
        }

        let mut scores: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = self.config.metric.score(query_vector, &entry.vector);
                // NaN ranks last
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        // Stable sort: equal scores stay in insertion order
        scores.sort_by(|a, b| b.1.total_cmp(&a.1));
        scores.truncate(k);

        Ok(scores
            .into_iter()
            .map(|(i, score)| RetrievalResult::new(self.entries[i].chunk.clone(), score))
            .collect())
    }

    /// Get a chunk by ID
    #[must_use]
    pub fn get(&self, chunk_id: ChunkId) -> Option<&EmbeddedChunk> {
        self.entries.iter().find(|e| e.chunk.id == chunk_id)
    }

    /// Get the number of stored vectors
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path of a collection file inside `dir`
    #[must_use]
    pub fn collection_path(dir: &Path, collection: &str) -> PathBuf {
        dir.join(format!("{collection}.json"))
    }

    /// Write the store to `<dir>/<collection>.json`
    pub fn persist(&self, dir: &Path, collection: &str) -> Result<PathBuf> {
        if collection.trim().is_empty() {
            return Err(Error::InvalidConfig("collection name is empty".to_string()));
        }
        fs::create_dir_all(dir)?;

        let persisted = PersistedCollection {
            name: collection.to_string(),
            config: self.config.clone(),
            records: self.entries.clone(),
        };

        let path = Self::collection_path(dir, collection);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(&persisted)?)?;
        fs::rename(&tmp, &path)?;

        tracing::info!(
            collection,
            path = %path.display(),
            entries = self.entries.len(),
            "persisted vector collection"
        );
        Ok(path)
    }

    /// Load a collection, checking it matches the caller's embedding model
    pub fn load(dir: &Path, collection: &str, dimension: usize, model_id: &str) -> Result<Self> {
        let path = Self::collection_path(dir, collection);
        if !path.exists() {
            return Err(Error::CollectionNotFound(format!(
                "{collection} (looked in {})",
                dir.display()
            )));
        }

        let persisted: PersistedCollection = serde_json::from_slice(&fs::read(&path)?)?;

        if persisted.config.dimension != dimension {
            return Err(Error::DimensionMismatch {
                expected: persisted.config.dimension,
                actual: dimension,
            });
        }
        if let Some(stored) = &persisted.config.model_id {
            if stored != model_id {
                return Err(Error::ModelMismatch {
                    expected: stored.clone(),
                    actual: model_id.to_string(),
                });
            }
        }

        let mut store = Self::new(persisted.config);
        store.insert_batch(persisted.records)?;

        tracing::info!(
            collection,
            entries = store.len(),
            model = model_id,
            "loaded vector collection"
        );
        Ok(store)
    }
}
