//! In-memory store using cosine similarity.
//!
//! [`InMemoryRagStore`] implements the full [`RagStore`] contract without a
//! database server. It ranks with the same math as pgvector's `<=>`
//! operator, so it is suitable for development, tests, and small corpora.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::document::{
    Chunk, ChunkBatch, ChunkId, DeleteOutcome, Document, DocumentId, DocumentStats, NewDocument,
    SearchQuery, SearchResult,
};
use crate::error::{RagStoreError, Result};
use crate::similarity::rank;
use crate::store::RagStore;

/// An in-memory [`RagStore`].
///
/// Documents and chunks live in ordered maps keyed by their ids, which are
/// assigned from monotonically increasing counters starting at 1. A batch
/// insert is checked in full before any row is applied, so a failing batch
/// leaves the store untouched.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::{InMemoryRagStore, RagStore};
///
/// let mut store = InMemoryRagStore::with_dimensions(384);
/// let id = store.insert_document(NewDocument::new("text")).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRagStore {
    dimensions: Option<usize>,
    documents: BTreeMap<DocumentId, Document>,
    chunks: BTreeMap<ChunkId, Chunk>,
    next_document_id: DocumentId,
    next_chunk_id: ChunkId,
}

impl InMemoryRagStore {
    /// Create an empty store that accepts embeddings of any dimensionality.
    ///
    /// Mismatched dimensions surface at query time as [`RagStoreError::Query`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that only accepts embeddings of `dimensions`,
    /// like a `vector(dimensions)` column.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: Some(dimensions), ..Self::default() }
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of stored chunks across all documents.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn allocate_document_id(&mut self) -> DocumentId {
        self.next_document_id += 1;
        self.next_document_id
    }

    fn allocate_chunk_id(&mut self) -> ChunkId {
        self.next_chunk_id += 1;
        self.next_chunk_id
    }
}

#[async_trait]
impl RagStore for InMemoryRagStore {
    async fn insert_document(&mut self, document: NewDocument) -> Result<DocumentId> {
        let id = self.allocate_document_id();
        let NewDocument { content, metadata, source } = document;
        self.documents
            .insert(id, Document { id, content, metadata, source, created_at: Utc::now() });
        info!(document.id = id, "inserted document");
        Ok(id)
    }

    async fn get_document(&mut self, id: DocumentId) -> Result<Option<Document>> {
        Ok(self.documents.get(&id).cloned())
    }

    async fn delete_document(&mut self, id: DocumentId) -> Result<DeleteOutcome> {
        if self.documents.remove(&id).is_none() {
            debug!(document.id = id, "delete_document: not found");
            return Ok(DeleteOutcome::NotFound);
        }

        let before = self.chunks.len();
        self.chunks.retain(|_, chunk| chunk.document_id != id);
        let chunks_removed = (before - self.chunks.len()) as u64;

        info!(document.id = id, chunks_removed, "deleted document and its chunks");
        Ok(DeleteOutcome::Deleted { chunks_removed })
    }

    async fn insert_chunks(&mut self, batch: ChunkBatch) -> Result<usize> {
        let rows = batch.validate()?;
        if rows.is_empty() {
            return Ok(0);
        }

        // Stage: every check a database constraint would make, before any
        // row is applied.
        if !self.documents.contains_key(&batch.document_id) {
            return Err(RagStoreError::write(
                "insert_chunks",
                format!("document {} does not exist", batch.document_id),
            ));
        }
        let mut taken: HashSet<i32> = self
            .chunks
            .values()
            .filter(|c| c.document_id == batch.document_id)
            .map(|c| c.chunk_index)
            .collect();
        for row in &rows {
            if let Some(expected) = self.dimensions {
                if row.embedding.len() != expected {
                    return Err(RagStoreError::write(
                        "insert_chunks",
                        format!(
                            "expected {expected} dimensions, not {} (chunk_index {})",
                            row.embedding.len(),
                            row.chunk_index
                        ),
                    ));
                }
            }
            if !taken.insert(row.chunk_index) {
                return Err(RagStoreError::write(
                    "insert_chunks",
                    format!(
                        "chunk_index {} already exists for document {}",
                        row.chunk_index, batch.document_id
                    ),
                ));
            }
        }

        // Apply.
        let count = rows.len();
        for row in rows {
            let id = self.allocate_chunk_id();
            self.chunks.insert(
                id,
                Chunk {
                    id,
                    document_id: batch.document_id,
                    chunk_index: row.chunk_index,
                    content: row.content.to_owned(),
                    metadata: row.metadata.cloned(),
                    embedding: row.embedding.to_vec(),
                },
            );
        }

        info!(document.id = batch.document_id, count, "inserted chunks");
        Ok(count)
    }

    async fn list_chunks(&mut self, document_id: DocumentId) -> Result<Vec<Chunk>> {
        let mut chunks: Vec<Chunk> =
            self.chunks.values().filter(|c| c.document_id == document_id).cloned().collect();
        chunks.sort_by_key(|c| c.chunk_index);
        Ok(chunks)
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;

        let candidates = self
            .chunks
            .values()
            .filter(|c| query.document_id.is_none_or(|id| c.document_id == id))
            .map(|c| (c.id, c.embedding.as_slice(), c));
        let ranked =
            rank(&query.embedding, query.top_k, query.similarity_threshold, candidates)?;

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .filter_map(|scored| {
                let similarity = scored.similarity();
                let chunk = scored.item;
                // Chunks never outlive their document, but a join drops
                // orphans rather than trusting that.
                let document = self.documents.get(&chunk.document_id)?;
                Some(SearchResult {
                    chunk_id: chunk.id,
                    document_id: chunk.document_id,
                    content: chunk.content.clone(),
                    metadata: chunk.metadata.clone(),
                    source: document.source.clone(),
                    similarity,
                })
            })
            .collect();

        debug!(result_count = results.len(), top_k = query.top_k, "search completed");
        Ok(results)
    }

    async fn document_stats(&mut self) -> Result<Vec<DocumentStats>> {
        let mut totals: BTreeMap<DocumentId, (i64, usize)> = BTreeMap::new();
        for chunk in self.chunks.values() {
            let entry = totals.entry(chunk.document_id).or_default();
            entry.0 += 1;
            entry.1 += chunk.content.chars().count();
        }

        Ok(self
            .documents
            .values()
            .map(|doc| {
                let (chunk_count, total_length) = totals.get(&doc.id).copied().unwrap_or_default();
                let avg_chunk_length = if chunk_count == 0 {
                    0.0
                } else {
                    total_length as f64 / chunk_count as f64
                };
                DocumentStats {
                    document_id: doc.id,
                    source: doc.source.clone(),
                    created_at: doc.created_at,
                    chunk_count,
                    avg_chunk_length,
                }
            })
            .collect())
    }
}
