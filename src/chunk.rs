//! Record chunking for the location corpus

use crate::{Error, RecordId, Result, SourceRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique chunk identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId(pub uuid::Uuid);

impl ChunkId {
    /// Create a new random chunk ID
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata inherited from the source record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source record title
    pub title: Option<String>,
    /// Source identifier (title column value or URL)
    pub source: Option<String>,
    /// Custom metadata
    pub custom: HashMap<String, serde_json::Value>,
}

/// A bounded-length piece of a record's text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier
    pub id: ChunkId,
    /// Source record reference
    pub record_id: RecordId,
    /// Chunk text content
    pub content: String,
    /// Byte offset in the source record (start)
    pub start_offset: usize,
    /// Byte offset in the source record (end)
    pub end_offset: usize,
    /// Metadata inherited from the record
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Create a new chunk
    #[must_use]
    pub fn new(record_id: RecordId, content: String, start_offset: usize, end_offset: usize) -> Self {
        Self {
            id: ChunkId::new(),
            record_id,
            content,
            start_offset,
            end_offset,
            metadata: ChunkMetadata::default(),
        }
    }

    /// Get the length of the chunk in characters
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.chars().count()
    }

    /// Check if the chunk is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Trait for record chunkers
pub trait Chunker: Send + Sync {
    /// Split a record into chunks
    fn chunk(&self, record: &SourceRecord) -> Result<Vec<Chunk>>;

    /// Estimate chunk count without materializing
    fn estimate_chunks(&self, record: &SourceRecord) -> usize;
}

/// Recursive character chunker with exact character overlap.
///
/// Each window holds at most `chunk_size` characters. Inside a window the cut
/// is placed right after the highest-priority separator that still leaves the
/// next window room to advance; when no separator qualifies the text is cut at
/// the character limit. The next window starts `overlap` characters before the
/// previous cut, so consecutive chunks share exactly `overlap` characters.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    separators: Vec<String>,
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveChunker {
    /// Create a new recursive chunker (sizes in characters)
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk overlap {overlap} must be smaller than chunk size {chunk_size}"
            )));
        }

        Ok(Self {
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
            ],
            chunk_size,
            overlap,
        })
    }

    /// Create with custom separators (tried in order)
    #[must_use]
    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators.into_iter().filter(|s| !s.is_empty()).collect();
        self
    }

    /// Target chunk size in characters
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters
    #[must_use]
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text` into overlapping windows
    #[must_use]
    pub fn windows<'a>(&'a self, text: &'a str) -> TextWindows<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        TextWindows {
            chunker: self,
            text,
            offsets,
            next_start: Some(0),
        }
    }
}

/// A window of text produced by [`RecursiveChunker::windows`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextWindow<'a> {
    /// Window text
    pub text: &'a str,
    /// Byte offset of the window start
    pub start: usize,
    /// Byte offset of the window end
    pub end: usize,
}

/// Lazy iterator over the windows of one text
#[derive(Debug, Clone)]
pub struct TextWindows<'a> {
    chunker: &'a RecursiveChunker,
    text: &'a str,
    /// Byte offset of every char plus the text length
    offsets: Vec<usize>,
    /// Char index where the next window starts
    next_start: Option<usize>,
}

impl TextWindows<'_> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Char index right after the best separator in `(start + overlap, limit]`
    fn cut_point(&self, start: usize, limit: usize) -> usize {
        let min_end = start + self.chunker.overlap;
        let window = &self.text[self.offsets[start]..self.offsets[limit]];

        for separator in &self.chunker.separators {
            let Some(pos) = window.rfind(separator.as_str()) else {
                continue;
            };
            let byte_end = self.offsets[start] + pos + separator.len();
            // The last occurrence is the best candidate; earlier ones only shrink the window.
            if let Ok(end) = self.offsets.binary_search(&byte_end) {
                if end > min_end {
                    return end;
                }
            }
        }

        limit
    }
}

impl<'a> Iterator for TextWindows<'a> {
    type Item = TextWindow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let total = self.char_count();
        if start >= total {
            self.next_start = None;
            return None;
        }

        let limit = start + self.chunker.chunk_size;
        let end = if limit >= total {
            total
        } else {
            self.cut_point(start, limit)
        };

        self.next_start = if end >= total {
            None
        } else {
            Some(end - self.chunker.overlap)
        };

        let (byte_start, byte_end) = (self.offsets[start], self.offsets[end]);
        Some(TextWindow {
            text: &self.text[byte_start..byte_end],
            start: byte_start,
            end: byte_end,
        })
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, record: &SourceRecord) -> Result<Vec<Chunk>> {
        if record.content.is_empty() {
            return Err(Error::EmptyDocument(
                record
                    .title
                    .clone()
                    .unwrap_or_else(|| "untitled".to_string()),
            ));
        }

        let chunks = self
            .windows(&record.content)
            .map(|window| {
                let mut chunk =
                    Chunk::new(record.id, window.text.to_string(), window.start, window.end);
                chunk.metadata = ChunkMetadata {
                    title: record.title.clone(),
                    source: record.source.clone(),
                    custom: record.metadata.clone(),
                };
                chunk
            })
            .collect();

        Ok(chunks)
    }

    fn estimate_chunks(&self, record: &SourceRecord) -> usize {
        let len = record.content.chars().count();
        if len == 0 {
            return 0;
        }
        if len <= self.chunk_size {
            return 1;
        }
        let step = self.chunk_size - self.overlap;
        (len - self.overlap + step - 1) / step
    }
}

/// Chunk many records in order, one record at a time
pub fn chunk_records<'a, C, I>(chunker: &'a C, records: I) -> impl Iterator<Item = Result<Chunk>> + 'a
where
    C: Chunker + ?Sized,
    I: IntoIterator<Item = SourceRecord>,
    I::IntoIter: 'a,
{
    records
        .into_iter()
        .flat_map(move |record| match chunker.chunk(&record) {
            Ok(chunks) => chunks.into_iter().map(Ok).collect::<Vec<_>>(),
            Err(e) => vec![Err(e)],
        })
}
