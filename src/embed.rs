//! Embedding adapters: hosted API, offline hashing, and local models

use crate::{index::EmbeddedChunk, Chunk, Error, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for embedding generation.
///
/// The same model identity must be used at ingestion and at query time; the
/// vector store records [`Embedder::model_id`] and rejects a mismatch on load.
pub trait Embedder: Send + Sync {
    /// Embed a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed multiple texts
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Get embedding dimension
    fn dimension(&self) -> usize;

    /// Get model identifier
    fn model_id(&self) -> &str;

    /// Embed a query (may use a query prefix)
    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(Error::Query("empty query".to_string()));
        }
        self.embed(query)
    }

    /// Embed a document (may use a document prefix)
    fn embed_document(&self, document: &str) -> Result<Vec<f32>> {
        self.embed(document)
    }

    /// Embed chunks, taking ownership of them
    fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<EmbeddedChunk>> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
        let vectors = self.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "{} embeddings returned for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddedChunk::new(chunk, vector))
            .collect())
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        (**self).embed_query(query)
    }

    fn embed_document(&self, document: &str) -> Result<Vec<f32>> {
        (**self).embed_document(document)
    }
}

/// Offline embedder using signed feature hashing of words and character bigrams.
///
/// Deterministic across runs and platforms, so collections built with it can be
/// persisted and reloaded. Useful without network access and in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashingEmbedder {
    /// Create a new hashing embedder
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            model_id: format!("hashing-{dimension}"),
        }
    }

    fn features(text: &str) -> Vec<String> {
        let mut features = Vec::new();
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let word = word.to_lowercase();
            let chars: Vec<char> = word.chars().collect();
            for pair in chars.windows(2) {
                features.push(pair.iter().collect());
            }
            features.push(word);
        }
        features
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for feature in Self::features(text) {
            let hash = fnv1a(feature.as_bytes());
            let slot = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[slot] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::EmptyDocument("empty text for embedding".to_string()));
        }
        Ok(self.hash_to_vector(text))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Default OpenAI-compatible endpoint for Google's hosted models
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Blocking embeddings client for OpenAI-compatible `/embeddings` endpoints.
///
/// There is no retry policy: a failed request surfaces as
/// [`Error::Embedding`]. Ingestion treats that as fatal; at query time the
/// caller reports it to the user.
#[derive(Debug, Clone)]
pub struct HostedEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

impl HostedEmbedder {
    /// Build a new hosted embeddings client
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        dimension: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let model = model.into();
        if api_key.trim().is_empty() {
            return Err(Error::InvalidConfig("missing embedding API key".to_string()));
        }
        if model.trim().is_empty() {
            return Err(Error::InvalidConfig("missing embedding model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| Error::InvalidConfig("invalid embedding API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model,
            dimension,
            batch_size: 100,
        })
    }

    /// Set the maximum number of inputs per request
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Request endpoint
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .map_err(|e| Error::Embedding(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(Error::Embedding(format!(
                "embeddings request failed ({status}): {body}"
            )));
        }

        let mut parsed: EmbeddingResponse = resp
            .json()
            .map_err(|e| Error::Embedding(format!("failed to parse embedding response: {e}")))?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != inputs.len() {
            return Err(Error::Embedding(format!(
                "{} embeddings returned for {} inputs",
                parsed.data.len(),
                inputs.len()
            )));
        }

        parsed
            .data
            .into_iter()
            .map(|entry| {
                if entry.embedding.len() == self.dimension {
                    Ok(entry.embedding)
                } else {
                    Err(Error::DimensionMismatch {
                        expected: self.dimension,
                        actual: entry.embedding.len(),
                    })
                }
            })
            .collect()
    }
}

impl Embedder for HostedEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::EmptyDocument("empty text for embedding".to_string()));
        }

        self.request(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(Error::EmptyDocument("empty text in batch".to_string()));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            tracing::debug!(size = batch.len(), model = %self.model, "embedding batch");
            vectors.extend(self.request(batch)?);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

/// Compute cosine similarity between two vectors
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Compute dot product between two vectors
#[must_use]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute euclidean distance between two vectors
#[must_use]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

// ============================================================================
// FastEmbed-based local sentence embeddings
// ============================================================================

/// Local embedding models available with the `embeddings` feature
#[cfg(feature = "embeddings")]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingModelType {
    /// multilingual-e5-small: Korean-capable, fast (384 dims)
    #[default]
    MultilingualE5Small,
    /// multilingual-e5-base: Korean-capable, higher quality (768 dims)
    MultilingualE5Base,
    /// paraphrase-multilingual-MiniLM-L12-v2: sentence-transformers style (384 dims)
    ParaphraseMultilingualMiniLm,
    /// all-MiniLM-L6-v2: English only (384 dims)
    AllMiniLmL6V2,
}

#[cfg(feature = "embeddings")]
impl EmbeddingModelType {
    fn to_fastembed_model(self) -> fastembed::EmbeddingModel {
        match self {
            Self::MultilingualE5Small => fastembed::EmbeddingModel::MultilingualE5Small,
            Self::MultilingualE5Base => fastembed::EmbeddingModel::MultilingualE5Base,
            Self::ParaphraseMultilingualMiniLm => fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2,
            Self::AllMiniLmL6V2 => fastembed::EmbeddingModel::AllMiniLML6V2,
        }
    }

    /// Get the embedding dimension for this model
    #[must_use]
    pub const fn dimension(self) -> usize {
        match self {
            Self::MultilingualE5Small | Self::ParaphraseMultilingualMiniLm | Self::AllMiniLmL6V2 => {
                384
            }
            Self::MultilingualE5Base => 768,
        }
    }

    /// Get the model name (also used as the collection's model id)
    #[must_use]
    pub const fn model_name(self) -> &'static str {
        match self {
            Self::MultilingualE5Small => "intfloat/multilingual-e5-small",
            Self::MultilingualE5Base => "intfloat/multilingual-e5-base",
            Self::ParaphraseMultilingualMiniLm => {
                "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2"
            }
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
        }
    }

    /// Every supported local model
    pub const ALL: [Self; 4] = [
        Self::MultilingualE5Small,
        Self::MultilingualE5Base,
        Self::ParaphraseMultilingualMiniLm,
        Self::AllMiniLmL6V2,
    ];

    /// Look up a model by its name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.model_name() == name || m.model_name().ends_with(&format!("/{name}")))
    }

    /// Look up a model by its name; unknown names are a configuration error
    pub fn require(name: &str) -> Result<Self> {
        Self::from_name(name).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "'{name}' is not a local embedding model (supported: {})",
                Self::ALL.map(Self::model_name).join(", ")
            ))
        })
    }

    /// E5 models expect `query: ` / `passage: ` prefixes
    const fn prefixes(self) -> (&'static str, &'static str) {
        match self {
            Self::MultilingualE5Small | Self::MultilingualE5Base => ("query: ", "passage: "),
            Self::ParaphraseMultilingualMiniLm | Self::AllMiniLmL6V2 => ("", ""),
        }
    }
}

/// Local sentence embedder using fastembed (ONNX Runtime)
///
/// Requires the `embeddings` feature. Downloads the model on first use.
#[cfg(feature = "embeddings")]
pub struct FastEmbedder {
    model: fastembed::TextEmbedding,
    model_type: EmbeddingModelType,
}

#[cfg(feature = "embeddings")]
impl std::fmt::Debug for FastEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedder")
            .field("model_type", &self.model_type)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "embeddings")]
impl FastEmbedder {
    /// Create a new FastEmbedder with the specified model
    pub fn new(model_type: EmbeddingModelType) -> Result<Self> {
        let options = fastembed::InitOptions::new(model_type.to_fastembed_model())
            .with_show_download_progress(true);

        let model = fastembed::TextEmbedding::try_new(options).map_err(|e| {
            Error::InvalidConfig(format!("failed to initialize embedding model: {e}"))
        })?;

        Ok(Self { model, model_type })
    }

    fn embed_prefixed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        self.model
            .embed(texts, None)
            .map_err(|e| Error::Embedding(format!("local embedding failed: {e}")))
    }
}

#[cfg(feature = "embeddings")]
impl Embedder for FastEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_document(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(Error::EmptyDocument("empty text in batch".to_string()));
        }
        let (_, passage) = self.model_type.prefixes();
        self.embed_prefixed(texts.iter().map(|t| format!("{passage}{t}")).collect())
    }

    fn dimension(&self) -> usize {
        self.model_type.dimension()
    }

    fn model_id(&self) -> &str {
        self.model_type.model_name()
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if query.trim().is_empty() {
            return Err(Error::Query("empty query".to_string()));
        }
        let (prefix, _) = self.model_type.prefixes();
        self.embed_prefixed(vec![format!("{prefix}{query}")])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))
    }

    fn embed_document(&self, document: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[document])?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("no embedding returned".to_string()))
    }
}
