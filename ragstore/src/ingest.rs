//! Document ingestion and text queries.
//!
//! The [`Ingestor`] coordinates the ingest workflow by composing a
//! [`Chunker`] and an [`EmbeddingProvider`] in front of any [`RagStore`]:
//! chunk → embed → insert document → insert chunks.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragstore::{Ingestor, InMemoryRagStore, NewDocument, SentenceChunker};
//!
//! let ingestor = Ingestor::new(Arc::new(my_embedder), Arc::new(SentenceChunker::default()));
//! let mut store = InMemoryRagStore::new();
//!
//! let report = ingestor.ingest(&mut store, NewDocument::new(text).with_source("a.md")).await?;
//! let results = ingestor.query(&mut store, "search query", 5, 0.5).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::chunking::Chunker;
use crate::document::{ChunkBatch, DocumentId, NewDocument, SearchQuery, SearchResult};
use crate::embedding::{EmbeddingProvider, check_embeddings};
use crate::error::{RagStoreError, Result};
use crate::store::RagStore;

/// Summary of one ingested document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestReport {
    /// The new document's id.
    pub document_id: DocumentId,
    /// Number of chunks stored under it.
    pub chunk_count: usize,
}

/// Chunks, embeds and stores documents; embeds and runs text queries.
#[derive(Clone)]
pub struct Ingestor {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
}

impl Ingestor {
    /// Create an ingestor from an embedding provider and a chunker.
    pub fn new(embedding_provider: Arc<dyn EmbeddingProvider>, chunker: Arc<dyn Chunker>) -> Self {
        Self { embedding_provider, chunker }
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Ingest a single document: chunk → embed → store.
    ///
    /// Embeddings are generated before anything is written. If storing the
    /// chunks fails, the just-inserted document is deleted again so no
    /// chunkless document is left behind, and the chunk error is returned.
    ///
    /// # Errors
    ///
    /// - [`RagStoreError::Validation`] if the content produces no chunks
    /// - [`RagStoreError::Embedding`] if the provider fails or returns
    ///   vectors of the wrong shape
    /// - any error from the store's writes
    pub async fn ingest<S>(&self, store: &mut S, document: NewDocument) -> Result<IngestReport>
    where
        S: RagStore + ?Sized,
    {
        let chunks = self.chunker.chunk(&document.content);
        if chunks.is_empty() {
            return Err(RagStoreError::Validation(
                "document content produced no chunks".to_string(),
            ));
        }

        let texts: Vec<&str> = chunks.iter().map(String::as_str).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(source = ?document.source, error = %e, "embedding failed during ingestion");
            e
        })?;
        check_embeddings(self.embedding_provider.as_ref(), chunks.len(), &embeddings)?;

        let source = document.source.clone();
        let document_id = store.insert_document(document).await?;

        let chunk_count = chunks.len();
        if let Err(e) = store.insert_chunks(ChunkBatch::new(document_id, chunks, embeddings)).await
        {
            error!(document.id = document_id, error = %e, "chunk insert failed during ingestion");
            if let Err(cleanup) = store.delete_document(document_id).await {
                warn!(
                    document.id = document_id,
                    error = %cleanup,
                    "failed to remove partial document"
                );
            }
            return Err(e);
        }

        info!(document.id = document_id, ?source, chunk_count, "ingested document");
        Ok(IngestReport { document_id, chunk_count })
    }

    /// Ingest several documents in order, stopping at the first failure.
    ///
    /// Documents ingested before the failure stay stored.
    pub async fn ingest_batch<S>(
        &self,
        store: &mut S,
        documents: Vec<NewDocument>,
    ) -> Result<Vec<IngestReport>>
    where
        S: RagStore + ?Sized,
    {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(store, document).await?);
        }
        Ok(reports)
    }

    /// Embed `text` and return the `top_k` most similar chunks whose
    /// similarity exceeds `similarity_threshold`.
    pub async fn query<S>(
        &self,
        store: &mut S,
        text: &str,
        top_k: usize,
        similarity_threshold: f64,
    ) -> Result<Vec<SearchResult>>
    where
        S: RagStore + ?Sized,
    {
        let embedding = self.embedding_provider.embed(text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;
        check_embeddings(self.embedding_provider.as_ref(), 1, std::slice::from_ref(&embedding))?;

        let query =
            SearchQuery::new(embedding).top_k(top_k).similarity_threshold(similarity_threshold);
        let results = store.search(&query).await?;
        info!(result_count = results.len(), "query completed");
        Ok(results)
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("embedding_provider", &self.embedding_provider.name())
            .field("dimensions", &self.embedding_provider.dimensions())
            .finish_non_exhaustive()
    }
}
