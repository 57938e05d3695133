//! Storage schema bootstrap.
//!
//! Creates the `documents` and `document_chunks` tables and the
//! `document_stats` view if they do not already exist. Requires the pgvector
//! extension to be installable by the connecting role.

use sqlx::Connection as _;
use tracing::{debug, info};

use crate::connection::Connection;
use crate::error::{RagStoreError, Result};

/// Options for [`ensure_schema`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchemaOptions {
    /// Fixed embedding dimensionality for the `embedding` column.
    ///
    /// `None` declares an unconstrained `vector` column, so dimensions are
    /// only checked when vectors are compared at query time.
    pub dimensions: Option<usize>,
}

impl SchemaOptions {
    /// Declare `embedding` as `vector(dimensions)`.
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions: Some(dimensions) }
    }
}

/// The SQL statements [`ensure_schema`] runs, in order.
pub fn schema_statements(options: SchemaOptions) -> Vec<String> {
    let vector_type = match options.dimensions {
        Some(d) => format!("vector({d})"),
        None => "vector".to_string(),
    };

    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        "CREATE TABLE IF NOT EXISTS documents (\
            id BIGSERIAL PRIMARY KEY, \
            content TEXT NOT NULL, \
            metadata JSONB, \
            source TEXT, \
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()\
        )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS document_chunks (\
                id BIGSERIAL PRIMARY KEY, \
                document_id BIGINT NOT NULL REFERENCES documents(id) ON DELETE CASCADE, \
                chunk_index INTEGER NOT NULL CHECK (chunk_index >= 0), \
                content TEXT NOT NULL, \
                metadata JSONB, \
                embedding {vector_type} NOT NULL, \
                UNIQUE (document_id, chunk_index)\
            )"
        ),
        "CREATE INDEX IF NOT EXISTS document_chunks_document_id_idx \
            ON document_chunks (document_id)"
            .to_string(),
        "CREATE OR REPLACE VIEW document_stats AS \
            SELECT d.id AS document_id, \
                   d.source, \
                   d.created_at, \
                   COUNT(c.id) AS chunk_count, \
                   COALESCE(AVG(char_length(c.content)), 0)::float8 AS avg_chunk_length \
            FROM documents d \
            LEFT JOIN document_chunks c ON c.document_id = d.id \
            GROUP BY d.id, d.source, d.created_at"
            .to_string(),
    ]
}

/// Create the store's tables and view if they are missing.
///
/// All statements run in one transaction, so a failure leaves the database
/// unchanged. Safe to call on every startup.
///
/// # Errors
///
/// - [`RagStoreError::Connection`] if the connection is closed
/// - [`RagStoreError::Write`] if any statement fails
pub async fn ensure_schema(conn: &mut Connection, options: SchemaOptions) -> Result<()> {
    let session = conn.session()?;
    let map_err = |e: sqlx::Error| RagStoreError::write("ensure_schema", e.to_string());

    let mut tx = session.begin().await.map_err(map_err)?;
    for statement in schema_statements(options) {
        debug!(%statement, "applying schema statement");
        sqlx::query(&statement).execute(&mut *tx).await.map_err(map_err)?;
    }
    tx.commit().await.map_err(map_err)?;

    info!(dimensions = ?options.dimensions, "schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_dimensions_are_declared_on_embedding_column() {
        let statements = schema_statements(SchemaOptions::with_dimensions(384));
        assert!(statements[2].contains("embedding vector(384) NOT NULL"));
    }

    #[test]
    fn unconstrained_vector_by_default() {
        let statements = schema_statements(SchemaOptions::default());
        assert!(statements[2].contains("embedding vector NOT NULL"));
    }

    #[test]
    fn chunks_cascade_with_their_document() {
        let statements = schema_statements(SchemaOptions::default());
        assert!(statements[2].contains("REFERENCES documents(id) ON DELETE CASCADE"));
        assert!(statements[2].contains("UNIQUE (document_id, chunk_index)"));
    }

    #[test]
    fn stats_view_keeps_chunkless_documents() {
        let statements = schema_statements(SchemaOptions::default());
        let view = statements.last().unwrap();
        assert!(view.contains("LEFT JOIN document_chunks"));
        assert!(view.contains("COALESCE(AVG(char_length(c.content)), 0)"));
    }
}
