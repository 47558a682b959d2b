//! FeelKo: filming-location question answering over a drama/movie corpus
//!
//! A retrieval-augmented pipeline: location records are ingested from CSV or
//! web pages, split into overlapping chunks, embedded, and stored in a vector
//! collection. A user's drama title is answered by retrieving the nearest
//! chunks and asking a hosted generative model for a JSON list of filming
//! locations, which the formatter renders for the chat session.
//!
//! # Quick Start
//!
//! ```rust
//! use feelko::{
//!     chunk::{Chunker, RecursiveChunker},
//!     embed::{Embedder, HashingEmbedder},
//!     index::VectorStore,
//!     SourceRecord,
//! };
//!
//! let embedder = HashingEmbedder::new(64);
//! let chunker = RecursiveChunker::new(300, 50).unwrap();
//! let record = SourceRecord::new("제목명: 슬기로운 의사생활\n장소명: 율제병원 촬영지")
//!     .with_title("슬기로운 의사생활");
//!
//! let chunks = chunker.chunk(&record).unwrap();
//! let embedded = embedder.embed_chunks(chunks).unwrap();
//!
//! let mut store = VectorStore::with_dimension(64);
//! store.insert_batch(embedded).unwrap();
//!
//! let query = embedder.embed_query("슬기로운 의사생활").unwrap();
//! let hits = store.search(&query, 5).unwrap();
//! assert_eq!(hits.len(), 1);
//! ```
//!
//! # Answer formatting
//!
//! ```rust
//! use feelko::format::format_answer;
//!
//! let raw = r#"[{"장소":"A","주소":"B","장면_설명":"C","장소_설명":"D"}]"#;
//! let rendered = format_answer(raw);
//! assert!(rendered.starts_with("=== 결과 1 ==="));
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]

pub mod chunk;
pub mod config;
pub mod embed;
pub mod error;
pub mod format;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod retrieve;
pub mod session;

#[cfg(test)]
mod test_server;

pub use chunk::{Chunk, ChunkId, ChunkMetadata, Chunker, RecursiveChunker};
pub use config::AppConfig;
pub use embed::{Embedder, HashingEmbedder, HostedEmbedder};
#[cfg(feature = "embeddings")]
pub use embed::{EmbeddingModelType, FastEmbedder};
pub use error::{Error, Result};
pub use format::{format_answer, parse_answer, LocationAnswer, ParsedAnswer};
pub use index::{EmbeddedChunk, VectorStore};
pub use ingest::{CsvLoader, WebLoader};
pub use llm::{Generator, HostedGenerator};
pub use pipeline::{EmptyContextPolicy, RetrievalChain, RetrievalChainBuilder};
pub use retrieve::{DenseRetriever, RetrievalResult};
pub use session::{ChatSession, ChatTurn, SessionState};

use std::collections::HashMap;

/// Source record identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RecordId(pub uuid::Uuid);

impl RecordId {
    /// Create a new random record ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of input data (a CSV row or a fetched web page)
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SourceRecord {
    /// Unique record identifier
    pub id: RecordId,
    /// Free-text content that gets chunked
    pub content: String,
    /// Drama/movie title (the grouping key)
    pub title: Option<String>,
    /// Source identifier (title column value or URL)
    pub source: Option<String>,
    /// Custom metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SourceRecord {
    /// Create a new record with the given content
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            content: content.into(),
            title: None,
            source: None,
            metadata: HashMap::new(),
        }
    }

    /// Set the record title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the record source
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attach a metadata value
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_creation() {
        let record = SourceRecord::new("장소명: 율제병원");
        assert_eq!(record.content, "장소명: 율제병원");
        assert!(record.title.is_none());
        assert!(record.source.is_none());
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_record_builder() {
        let record = SourceRecord::new("Content")
            .with_title("슬기로운 의사생활")
            .with_source("data/locations.csv")
            .with_metadata("row", serde_json::json!(3));

        assert_eq!(record.title.as_deref(), Some("슬기로운 의사생활"));
        assert_eq!(record.source.as_deref(), Some("data/locations.csv"));
        assert_eq!(record.metadata["row"], serde_json::json!(3));
    }

    #[test]
    fn test_record_id_display() {
        let id = RecordId::new();
        let display = format!("{id}");
        assert!(display.contains('-')); // UUID format
    }

    #[test]
    fn test_record_id_serialization() {
        let id = RecordId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}
