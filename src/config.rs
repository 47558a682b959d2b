//! Application configuration loaded from TOML

use crate::{
    embed::GEMINI_OPENAI_BASE_URL,
    ingest::{SourceKind, DEFAULT_TITLE_COLUMN},
    llm::DEFAULT_CHAT_MODEL,
    pipeline::EmptyContextPolicy, retrieve::DEFAULT_TOP_K, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default environment variable holding the API credential
pub const DEFAULT_API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Top-level configuration. Every section is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment variable the API key is read from
    pub api_key_env: String,
    /// Generative model settings
    pub llm: LlmConfig,
    /// Embedding settings
    pub embedding: EmbeddingConfig,
    /// Vector store location
    pub store: StoreConfig,
    /// Retrieval settings
    pub retrieval: RetrievalConfig,
    /// Chunking settings
    pub chunking: ChunkingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            store: StoreConfig::default(),
            retrieval: RetrievalConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

/// `[llm]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub base_url: String,
    /// Chat model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token limit
    pub max_tokens: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which embedder backs ingestion and queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API
    #[default]
    Hosted,
    /// Offline feature hashing
    Hashing,
    /// Local model (requires the `embeddings` feature)
    Local,
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Hosted => "hosted",
            Self::Hashing => "hashing",
            Self::Local => "local",
        })
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(Self::Hosted),
            "hashing" => Ok(Self::Hashing),
            "local" => Ok(Self::Local),
            other => Err(Error::InvalidConfig(format!(
                "unknown embedding provider '{other}' (expected hosted, hashing or local)"
            ))),
        }
    }
}

/// `[embedding]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Embedder backend
    pub provider: EmbeddingProvider,
    /// OpenAI-compatible base URL (hosted provider)
    pub base_url: String,
    /// Model name (hosted or local provider)
    pub model: String,
    /// Vector dimension
    pub dimension: usize,
    /// Inputs per request (hosted provider)
    pub batch_size: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Hosted,
            base_url: GEMINI_OPENAI_BASE_URL.to_string(),
            model: "text-embedding-004".to_string(),
            dimension: 768,
            batch_size: 100,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingConfig {
    /// Request timeout
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding collections
    pub path: PathBuf,
    /// Collection name
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vector_db"),
            collection: "documents".to_string(),
        }
    }
}

/// `[retrieval]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per query
    pub top_k: usize,
    /// Behaviour when nothing is retrieved
    pub empty_context: EmptyContextPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            empty_context: EmptyContextPolicy::Invoke,
        }
    }
}

/// `[chunking]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Chunk size for CSV rows
    pub csv_chunk_size: usize,
    /// Overlap for CSV rows
    pub csv_overlap: usize,
    /// Chunk size for web pages
    pub web_chunk_size: usize,
    /// Overlap for web pages
    pub web_overlap: usize,
    /// CSV column holding the title
    pub title_column: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        let (csv_chunk_size, csv_overlap) = SourceKind::Csv.default_chunking();
        let (web_chunk_size, web_overlap) = SourceKind::Web.default_chunking();
        Self {
            csv_chunk_size,
            csv_overlap,
            web_chunk_size,
            web_overlap,
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
        }
    }
}

impl ChunkingConfig {
    /// `(chunk_size, overlap)` configured for a source kind
    #[must_use]
    pub fn for_kind(&self, kind: SourceKind) -> (usize, usize) {
        match kind {
            SourceKind::Csv => (self.csv_chunk_size, self.csv_overlap),
            SourceKind::Web => (self.web_chunk_size, self.web_overlap),
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::InvalidConfig(format!("failed to read {}: {e}", path.display()))
                })?;
                let config = Self::from_toml(&content)?;
                tracing::debug!(path = %path.display(), "loaded configuration");
                config
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.api_key_env.trim().is_empty() {
            return invalid("api_key_env must not be empty");
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be at least 1");
        }
        if self.embedding.dimension == 0 {
            return invalid("embedding.dimension must be at least 1");
        }
        if self.chunking.csv_overlap >= self.chunking.csv_chunk_size {
            return invalid("chunking.csv_overlap must be smaller than csv_chunk_size");
        }
        if self.chunking.web_overlap >= self.chunking.web_chunk_size {
            return invalid("chunking.web_overlap must be smaller than web_chunk_size");
        }
        if self.store.collection.trim().is_empty() {
            return invalid("store.collection must not be empty");
        }
        Ok(())
    }

    /// Read the API credential from the environment
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(Error::MissingCredential(self.api_key_env.clone())),
        }
    }
}
