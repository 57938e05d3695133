//! The store contract shared by every backend.

use async_trait::async_trait;

use crate::document::{
    Chunk, ChunkBatch, DeleteOutcome, Document, DocumentId, DocumentStats, NewDocument,
    SearchQuery, SearchResult,
};
use crate::error::Result;

/// A document/chunk store with cosine similarity search.
///
/// Every operation takes `&mut self`: a store owns exactly one session and
/// cannot be driven from two tasks at once without external synchronization.
/// Open one store per concurrent caller instead of sharing one.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::{ChunkBatch, InMemoryRagStore, NewDocument, RagStore, SearchQuery};
///
/// let mut store = InMemoryRagStore::new();
/// let id = store.insert_document(NewDocument::new("D1")).await?;
/// store
///     .insert_chunks(ChunkBatch::new(
///         id,
///         vec!["hello world".into(), "foo bar baz".into()],
///         vec![vec![1.0, 0.0], vec![0.0, 1.0]],
///     ))
///     .await?;
/// let hits = store.search(&SearchQuery::new(vec![1.0, 0.0]).top_k(1)).await?;
/// ```
#[async_trait]
pub trait RagStore: Send {
    /// Insert a document and return its store-assigned id.
    ///
    /// The document is committed and visible to subsequent reads when this
    /// returns.
    async fn insert_document(&mut self, document: NewDocument) -> Result<DocumentId>;

    /// Fetch a document by id. Returns `None` if it does not exist.
    async fn get_document(&mut self, id: DocumentId) -> Result<Option<Document>>;

    /// Delete a document and all of its chunks atomically.
    ///
    /// Deleting an id that does not exist is not an error; it reports
    /// [`DeleteOutcome::NotFound`].
    async fn delete_document(&mut self, id: DocumentId) -> Result<DeleteOutcome>;

    /// Insert a batch of chunks under one document atomically.
    ///
    /// The batch is validated before anything is written. Either every chunk
    /// becomes visible or none does. Returns the number of chunks written.
    async fn insert_chunks(&mut self, batch: ChunkBatch) -> Result<usize>;

    /// List a document's chunks ordered by `chunk_index`.
    ///
    /// Returns an empty list for a document with no chunks or that does not
    /// exist.
    async fn list_chunks(&mut self, document_id: DocumentId) -> Result<Vec<Chunk>>;

    /// Find the chunks most similar to the query embedding.
    ///
    /// Returns at most `top_k` results, each with a similarity strictly
    /// greater than the threshold, in non-increasing similarity order.
    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<SearchResult>>;

    /// Per-document chunk counts and mean chunk lengths, ordered by document id.
    async fn document_stats(&mut self) -> Result<Vec<DocumentStats>>;
}
