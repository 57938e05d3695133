//! PostgreSQL + pgvector store backend.
//!
//! Provides [`PgRagStore`] which implements [`RagStore`] over a single owned
//! [`Connection`] using [sqlx](https://docs.rs/sqlx) and the
//! [pgvector](https://github.com/pgvector/pgvector) extension.
//!
//! # Prerequisites
//!
//! - PostgreSQL with the `pgvector` extension available
//! - The schema from [`ensure_schema`](crate::schema::ensure_schema)
//!
//! # Example
//!
//! ```rust,ignore
//! use ragstore::{PgConfig, PgRagStore, SchemaOptions};
//!
//! let mut store = PgRagStore::open(&PgConfig::from_env()?).await?;
//! store.ensure_schema(SchemaOptions::with_dimensions(384)).await?;
//! let id = store.insert_document(NewDocument::new(text).with_source("a.txt")).await?;
//! store.insert_chunks(ChunkBatch::new(id, chunks, embeddings)).await?;
//! let results = store.search(&SearchQuery::new(query_embedding)).await?;
//! store.close().await;
//! ```
//!
//! Every write runs in its own transaction. Searches run under the server's
//! default read-committed isolation, so they never observe a half-written
//! batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Connection as _, Postgres, QueryBuilder, Row};
use tracing::{debug, error, info};

use crate::config::PgConfig;
use crate::connection::Connection;
use crate::document::{
    Chunk, ChunkBatch, ChunkRow, DeleteOutcome, Document, DocumentId, DocumentStats, Metadata,
    NewDocument, SearchQuery, SearchResult,
};
use crate::error::{RagStoreError, Result};
use crate::schema::{self, SchemaOptions};
use crate::similarity::{parse_vector_literal, vector_literal};
use crate::store::RagStore;

/// Rows per `INSERT` statement. Five bind parameters per row keeps each
/// statement well under PostgreSQL's 65535 parameter limit.
const INSERT_SLICE_ROWS: usize = 1000;

const CHUNK_INSERT_PREFIX: &str =
    "INSERT INTO document_chunks (document_id, chunk_index, content, metadata, embedding) ";

const SEARCH_SQL: &str = "\
    SELECT dc.id, dc.document_id, dc.content, dc.metadata, d.source, \
           1 - (dc.embedding <=> $1::vector) AS similarity \
    FROM document_chunks dc \
    JOIN documents d ON dc.document_id = d.id \
    WHERE 1 - (dc.embedding <=> $1::vector) > $2 \
      AND (dc.embedding <=> $1::vector) <> 'NaN'::float8 \
      AND ($4::bigint IS NULL OR dc.document_id = $4) \
    ORDER BY dc.embedding <=> $1::vector, dc.id \
    LIMIT $3";

/// A [`RagStore`] backed by PostgreSQL with the pgvector extension.
#[derive(Debug)]
pub struct PgRagStore {
    conn: Connection,
}

impl PgRagStore {
    /// Open a connection and wrap it in a store.
    pub async fn open(config: &PgConfig) -> Result<Self> {
        Ok(Self { conn: Connection::open(config).await? })
    }

    /// Wrap an already open connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Borrow the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Create the tables and view this store needs, if missing.
    pub async fn ensure_schema(&mut self, options: SchemaOptions) -> Result<()> {
        schema::ensure_schema(&mut self.conn, options).await
    }

    /// Close the underlying connection. Idempotent.
    pub async fn close(&mut self) {
        self.conn.close().await;
    }

    /// Release the store and hand back its connection.
    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

/// Whether a driver error means the session itself is unusable.
fn is_connection_failure(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

fn write_err(operation: &'static str) -> impl Fn(sqlx::Error) -> RagStoreError {
    move |e| {
        if is_connection_failure(&e) {
            RagStoreError::Connection(format!("{operation}: {e}"))
        } else {
            RagStoreError::write(operation, e.to_string())
        }
    }
}

fn query_err(operation: &'static str) -> impl Fn(sqlx::Error) -> RagStoreError {
    move |e| {
        if is_connection_failure(&e) {
            RagStoreError::Connection(format!("{operation}: {e}"))
        } else {
            RagStoreError::Query(format!("{operation}: {e}"))
        }
    }
}

fn decode_metadata(
    row: &PgRow,
    column: &str,
) -> std::result::Result<Option<Metadata>, sqlx::Error> {
    let value: Option<Json<Metadata>> = row.try_get(column)?;
    Ok(value.map(|Json(m)| m))
}

fn push_chunk_rows(
    builder: &mut QueryBuilder<'_, Postgres>,
    document_id: DocumentId,
    rows: &[ChunkRow<'_>],
) {
    builder.push_values(rows, |mut b, row| {
        b.push_bind(document_id)
            .push_bind(row.chunk_index)
            .push_bind(row.content.to_owned())
            .push_bind(row.metadata.cloned().map(Json))
            .push_bind(vector_literal(row.embedding))
            .push_unseparated("::vector");
    });
}

#[async_trait]
impl RagStore for PgRagStore {
    async fn insert_document(&mut self, document: NewDocument) -> Result<DocumentId> {
        let map_err = write_err("insert_document");
        let session = self.conn.session()?;

        let mut tx = session.begin().await.map_err(&map_err)?;
        let id: DocumentId = sqlx::query_scalar(
            "INSERT INTO documents (content, metadata, source) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&document.content)
        .bind(document.metadata.map(Json))
        .bind(&document.source)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to insert document");
            map_err(e)
        })?;
        tx.commit().await.map_err(&map_err)?;

        info!(document.id = id, source = ?document.source, "inserted document");
        Ok(id)
    }

    async fn get_document(&mut self, id: DocumentId) -> Result<Option<Document>> {
        let map_err = query_err("get_document");
        let row = sqlx::query(
            "SELECT id, content, metadata, source, created_at FROM documents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.conn.session()?)
        .await
        .map_err(&map_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let decode = |row: &PgRow| -> std::result::Result<Document, sqlx::Error> {
            Ok(Document {
                id: row.try_get("id")?,
                content: row.try_get("content")?,
                metadata: decode_metadata(row, "metadata")?,
                source: row.try_get("source")?,
                created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            })
        };
        decode(&row).map(Some).map_err(map_err)
    }

    async fn delete_document(&mut self, id: DocumentId) -> Result<DeleteOutcome> {
        let map_err = write_err("delete_document");
        let session = self.conn.session()?;

        let mut tx = session.begin().await.map_err(&map_err)?;
        // Lock the parent row first so a concurrent chunk insert cannot slip
        // in between counting and deleting.
        let exists = sqlx::query("SELECT id FROM documents WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(&map_err)?
            .is_some();

        if !exists {
            tx.rollback().await.map_err(&map_err)?;
            debug!(document.id = id, "delete_document: not found");
            return Ok(DeleteOutcome::NotFound);
        }

        let chunks_removed = sqlx::query("DELETE FROM document_chunks WHERE document_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(&map_err)?
            .rows_affected();
        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!(document.id = id, error = %e, "failed to delete document");
                map_err(e)
            })?;
        tx.commit().await.map_err(&map_err)?;

        info!(document.id = id, chunks_removed, "deleted document and its chunks");
        Ok(DeleteOutcome::Deleted { chunks_removed })
    }

    async fn insert_chunks(&mut self, batch: ChunkBatch) -> Result<usize> {
        let rows = batch.validate()?;
        if rows.is_empty() {
            return Ok(0);
        }

        let map_err = write_err("insert_chunks");
        let session = self.conn.session()?;

        // Dropping the transaction without commit rolls back every slice.
        let mut tx = session.begin().await.map_err(&map_err)?;
        for slice in rows.chunks(INSERT_SLICE_ROWS) {
            let mut builder = QueryBuilder::<Postgres>::new(CHUNK_INSERT_PREFIX);
            push_chunk_rows(&mut builder, batch.document_id, slice);
            builder.build().execute(&mut *tx).await.map_err(|e| {
                error!(document.id = batch.document_id, error = %e, "failed to insert chunks");
                map_err(e)
            })?;
        }
        tx.commit().await.map_err(&map_err)?;

        info!(document.id = batch.document_id, count = rows.len(), "inserted chunks");
        Ok(rows.len())
    }

    async fn list_chunks(&mut self, document_id: DocumentId) -> Result<Vec<Chunk>> {
        let map_err = query_err("list_chunks");
        let rows = sqlx::query(
            "SELECT id, document_id, chunk_index, content, metadata, embedding::text AS embedding \
             FROM document_chunks WHERE document_id = $1 ORDER BY chunk_index",
        )
        .bind(document_id)
        .fetch_all(self.conn.session()?)
        .await
        .map_err(&map_err)?;

        rows.iter()
            .map(|row| -> Result<Chunk> {
                let embedding: String = row.try_get("embedding").map_err(&map_err)?;
                Ok(Chunk {
                    id: row.try_get("id").map_err(&map_err)?,
                    document_id: row.try_get("document_id").map_err(&map_err)?,
                    chunk_index: row.try_get("chunk_index").map_err(&map_err)?,
                    content: row.try_get("content").map_err(&map_err)?,
                    metadata: decode_metadata(row, "metadata").map_err(&map_err)?,
                    embedding: parse_vector_literal(&embedding)?,
                })
            })
            .collect()
    }

    async fn search(&mut self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        query.validate()?;
        let map_err = query_err("search");
        let top_k = i64::try_from(query.top_k).unwrap_or(i64::MAX);

        let rows = sqlx::query(SEARCH_SQL)
            .bind(vector_literal(&query.embedding))
            .bind(query.similarity_threshold)
            .bind(top_k)
            .bind(query.document_id)
            .fetch_all(self.conn.session()?)
            .await
            .map_err(|e| {
                error!(error = %e, "similarity search failed");
                map_err(e)
            })?;

        let results = rows
            .iter()
            .map(|row| -> std::result::Result<SearchResult, sqlx::Error> {
                Ok(SearchResult {
                    chunk_id: row.try_get("id")?,
                    document_id: row.try_get("document_id")?,
                    content: row.try_get("content")?,
                    metadata: decode_metadata(row, "metadata")?,
                    source: row.try_get("source")?,
                    similarity: row.try_get("similarity")?,
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(&map_err)?;

        debug!(result_count = results.len(), top_k = query.top_k, "search completed");
        Ok(results)
    }

    async fn document_stats(&mut self) -> Result<Vec<DocumentStats>> {
        let map_err = query_err("document_stats");
        let rows = sqlx::query(
            "SELECT document_id, source, created_at, chunk_count, avg_chunk_length \
             FROM document_stats ORDER BY document_id",
        )
        .fetch_all(self.conn.session()?)
        .await
        .map_err(&map_err)?;

        rows.iter()
            .map(|row| -> std::result::Result<DocumentStats, sqlx::Error> {
                Ok(DocumentStats {
                    document_id: row.try_get("document_id")?,
                    source: row.try_get("source")?,
                    created_at: row.try_get("created_at")?,
                    chunk_count: row.try_get("chunk_count")?,
                    avg_chunk_length: row
                        .try_get::<Option<f64>, _>("avg_chunk_length")?
                        .unwrap_or(0.0),
                })
            })
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(map_err)
    }
}
