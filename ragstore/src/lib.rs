//! Document and chunk retrieval store built on vector embeddings.
//!
//! `ragstore` persists text chunks alongside fixed-dimension embedding
//! vectors and answers nearest-neighbor queries with thresholding and
//! ranking. Similarity is `1 - cosine_distance`.
//!
//! # Backends
//!
//! - [`PgRagStore`]: PostgreSQL with the pgvector extension, one owned
//!   [`Connection`] per store
//! - [`InMemoryRagStore`]: no server; identical ranking semantics
//!
//! Both implement [`RagStore`].
//!
//! # Guarantees
//!
//! - A chunk batch is written atomically: all rows or none.
//! - Deleting a document removes its chunks in the same transaction.
//! - Search results have `similarity > threshold`, number at most `top_k`,
//!   and come in non-increasing similarity order (ties by chunk id).
//!
//! # Example
//!
//! ```rust,ignore
//! use ragstore::{ChunkBatch, NewDocument, PgConfig, PgRagStore, RagStore, SchemaOptions, SearchQuery};
//!
//! let mut store = PgRagStore::open(&PgConfig::from_dotenv()?).await?;
//! store.ensure_schema(SchemaOptions::with_dimensions(2)).await?;
//!
//! let id = store.insert_document(NewDocument::new("D1")).await?;
//! store
//!     .insert_chunks(ChunkBatch::new(
//!         id,
//!         vec!["hello world".into(), "foo bar baz".into()],
//!         vec![vec![1.0, 0.0], vec![0.0, 1.0]],
//!     ))
//!     .await?;
//!
//! let hits = store.search(&SearchQuery::new(vec![1.0, 0.0]).top_k(1).similarity_threshold(0.0)).await?;
//! assert_eq!(hits[0].content, "hello world");
//! store.close().await;
//! ```

pub mod chunking;
pub mod config;
pub mod connection;
pub mod document;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod similarity;
pub mod store;

pub use chunking::{Chunker, FixedSizeChunker, SentenceChunker, estimate_tokens};
pub use config::{PgConfig, PgConfigBuilder};
pub use connection::{Connection, ServerInfo};
pub use document::{
    Chunk, ChunkBatch, ChunkId, DeleteOutcome, Document, DocumentId, DocumentStats, Metadata,
    NewDocument, SearchQuery, SearchResult,
};
pub use embedding::EmbeddingProvider;
pub use error::{RagStoreError, Result};
pub use ingest::{IngestReport, Ingestor};
pub use memory::InMemoryRagStore;
pub use postgres::PgRagStore;
pub use schema::{SchemaOptions, ensure_schema};
pub use store::RagStore;
