//! Data types for documents, chunks, search queries and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagStoreError, Result};

/// Store-assigned document identifier.
pub type DocumentId = i64;

/// Store-assigned chunk identifier.
pub type ChunkId = i64;

/// Free-form metadata attached to documents and chunks.
///
/// Values are arbitrary JSON (null, bool, number, string, list, map) and are
/// stored as-is, never interpreted by the store.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// Default minimum similarity a chunk must strictly exceed to be returned.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.5;

/// A document to be inserted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewDocument {
    /// The full source text.
    pub content: String,
    /// Optional document-level metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Optional provenance tag (filename, URL, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl NewDocument {
    /// Create a document with the given content and no metadata or source.
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: None, source: None }
    }

    /// Attach document-level metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Attach a provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A stored document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Store-assigned identifier.
    pub id: DocumentId,
    /// The full source text.
    pub content: String,
    /// Document-level metadata, if any was supplied.
    pub metadata: Option<Metadata>,
    /// Provenance tag, if any was supplied.
    pub source: Option<String>,
    /// Insertion timestamp, assigned by the store.
    pub created_at: DateTime<Utc>,
}

/// A stored chunk of a [`Document`] with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Store-assigned identifier.
    pub id: ChunkId,
    /// The owning document.
    pub document_id: DocumentId,
    /// Zero-based position of this chunk within its document.
    pub chunk_index: i32,
    /// The chunk's text span.
    pub content: String,
    /// Per-chunk metadata, independent of the parent document's.
    pub metadata: Option<Metadata>,
    /// The embedding vector.
    pub embedding: Vec<f32>,
}

/// A batch of chunks to insert under one document.
///
/// `chunks`, `embeddings` and (when present) `metadata` are parallel
/// sequences. A shorter `metadata` list is padded with "no metadata"; a
/// `chunks`/`embeddings` length mismatch is rejected by [`ChunkBatch::validate`]
/// before anything is written.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::ChunkBatch;
///
/// let batch = ChunkBatch::new(doc_id, vec!["hello world".into()], vec![vec![1.0, 0.0]]);
/// store.insert_chunks(batch).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkBatch {
    /// The owning document.
    pub document_id: DocumentId,
    /// Chunk texts, in retrieval order.
    pub chunks: Vec<String>,
    /// One embedding per chunk.
    pub embeddings: Vec<Vec<f32>>,
    /// Optional per-chunk metadata; missing entries mean "no metadata".
    pub metadata: Vec<Option<Metadata>>,
    /// `chunk_index` of the first chunk in this batch.
    ///
    /// The store never derives indexes from previously stored chunks; callers
    /// appending to a document set this past the indexes already in use.
    pub start_index: i32,
}

/// A validated row of a [`ChunkBatch`], ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow<'a> {
    /// Position of this chunk within its document.
    pub chunk_index: i32,
    /// The chunk's text span.
    pub content: &'a str,
    /// Per-chunk metadata.
    pub metadata: Option<&'a Metadata>,
    /// The embedding vector.
    pub embedding: &'a [f32],
}

impl ChunkBatch {
    /// Create a batch starting at `chunk_index` 0 with no per-chunk metadata.
    pub fn new(document_id: DocumentId, chunks: Vec<String>, embeddings: Vec<Vec<f32>>) -> Self {
        Self { document_id, chunks, embeddings, metadata: Vec::new(), start_index: 0 }
    }

    /// Attach per-chunk metadata.
    pub fn with_metadata(mut self, metadata: Vec<Option<Metadata>>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the `chunk_index` of the first chunk.
    pub fn starting_at(mut self, start_index: i32) -> Self {
        self.start_index = start_index;
        self
    }

    /// Number of chunks in the batch.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the batch holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Check the batch shape and produce the rows to write.
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Validation`] if:
    /// - `chunks` and `embeddings` differ in length
    /// - `metadata` is longer than `chunks`
    /// - `start_index` is negative or the last index would overflow
    /// - an embedding is empty or has a NaN or infinite component
    pub fn validate(&self) -> Result<Vec<ChunkRow<'_>>> {
        if self.chunks.len() != self.embeddings.len() {
            return Err(RagStoreError::Validation(format!(
                "number of chunks ({}) must match number of embeddings ({})",
                self.chunks.len(),
                self.embeddings.len()
            )));
        }
        if self.metadata.len() > self.chunks.len() {
            return Err(RagStoreError::Validation(format!(
                "number of metadata entries ({}) exceeds number of chunks ({})",
                self.metadata.len(),
                self.chunks.len()
            )));
        }
        if self.start_index < 0 {
            return Err(RagStoreError::Validation(format!(
                "start_index must not be negative, got {}",
                self.start_index
            )));
        }
        i32::try_from(self.chunks.len())
            .ok()
            .and_then(|n| self.start_index.checked_add(n))
            .ok_or_else(|| {
                RagStoreError::Validation("chunk_index range overflows i32".to_string())
            })?;

        self.chunks
            .iter()
            .zip(&self.embeddings)
            .enumerate()
            .map(|(i, (content, embedding))| {
                if embedding.is_empty() {
                    return Err(RagStoreError::Validation(format!(
                        "embedding for chunk {i} is empty"
                    )));
                }
                if embedding.iter().any(|x| !x.is_finite()) {
                    return Err(RagStoreError::Validation(format!(
                        "embedding for chunk {i} has a non-finite component"
                    )));
                }
                Ok(ChunkRow {
                    // Bounded by the overflow check above.
                    chunk_index: self.start_index + i as i32,
                    content,
                    metadata: self.metadata.get(i).and_then(Option::as_ref),
                    embedding,
                })
            })
            .collect()
    }
}

/// Parameters of a similarity search.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::SearchQuery;
///
/// let query = SearchQuery::new(embedding).top_k(3).similarity_threshold(0.7);
/// let results = store.search(&query).await?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    /// The query embedding.
    pub embedding: Vec<f32>,
    /// Maximum number of results.
    pub top_k: usize,
    /// Results must have a similarity strictly greater than this value.
    pub similarity_threshold: f64,
    /// Restrict the search to a single document's chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<DocumentId>,
}

impl SearchQuery {
    /// Create a query with the default `top_k` (5) and threshold (0.5).
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            top_k: DEFAULT_TOP_K,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            document_id: None,
        }
    }

    /// Set the maximum number of results.
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Set the similarity threshold.
    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Restrict the search to one document.
    pub fn in_document(mut self, document_id: DocumentId) -> Self {
        self.document_id = Some(document_id);
        self
    }

    /// Check the query parameters.
    ///
    /// Dimensionality is not checked here; a mismatch with stored embeddings
    /// surfaces as [`RagStoreError::Query`] from the search itself.
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Validation`] if:
    /// - `top_k == 0`
    /// - the threshold is not a finite number in `[0, 1]`
    /// - the embedding is empty or has a NaN or infinite component
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagStoreError::Validation("top_k must be greater than zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(RagStoreError::Validation(format!(
                "similarity_threshold must be within [0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.embedding.is_empty() {
            return Err(RagStoreError::Validation("query embedding is empty".to_string()));
        }
        if self.embedding.iter().any(|x| !x.is_finite()) {
            return Err(RagStoreError::Validation(
                "query embedding has a non-finite component".to_string(),
            ));
        }
        Ok(())
    }
}

/// A chunk matched by a similarity search, joined with its document's source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk_id: ChunkId,
    /// The owning document.
    pub document_id: DocumentId,
    /// The chunk's text span.
    pub content: String,
    /// Per-chunk metadata.
    pub metadata: Option<Metadata>,
    /// The owning document's provenance tag.
    pub source: Option<String>,
    /// `1 - cosine_distance(query, chunk)`; higher is more similar.
    pub similarity: f64,
}

/// Per-document chunk rollup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentStats {
    /// The document.
    pub document_id: DocumentId,
    /// The document's provenance tag.
    pub source: Option<String>,
    /// When the document was inserted.
    pub created_at: DateTime<Utc>,
    /// Number of chunks owned by the document.
    pub chunk_count: i64,
    /// Mean chunk length in characters; `0.0` for a document with no chunks.
    pub avg_chunk_length: f64,
}

/// Outcome of [`RagStore::delete_document`](crate::RagStore::delete_document).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DeleteOutcome {
    /// The document existed and was removed with its chunks.
    Deleted {
        /// Number of chunks removed along with the document.
        chunks_removed: u64,
    },
    /// No document had the given id.
    NotFound,
}

impl DeleteOutcome {
    /// Whether a document was actually removed.
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}
