//! The seam to whatever model turns text into vectors.
//!
//! The store never generates embeddings itself; it persists and compares
//! whatever vectors a provider hands it.

use async_trait::async_trait;

use crate::error::{RagStoreError, Result};

/// Turns text into fixed-dimension vectors for the [`Ingestor`](crate::Ingestor).
///
/// Implementations wrap a model or an embedding service. Only `embed` is
/// required; override `embed_batch` when the backend batches natively.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::EmbeddingProvider;
///
/// let vectors = provider.embed_batch(&["hello world", "foo bar baz"]).await?;
/// assert!(vectors.iter().all(|v| v.len() == provider.dimensions()));
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name used in error messages and logs.
    fn name(&self) -> &str;

    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning vectors in input order.
    ///
    /// Calls [`embed`](EmbeddingProvider::embed) once per text and stops at
    /// the first failure.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for &text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// Length of every vector this provider returns.
    fn dimensions(&self) -> usize;
}

/// Check that a provider returned one vector per input, each of the
/// dimensionality it advertises.
pub(crate) fn check_embeddings(
    provider: &dyn EmbeddingProvider,
    expected: usize,
    embeddings: &[Vec<f32>],
) -> Result<()> {
    if embeddings.len() != expected {
        return Err(RagStoreError::Embedding {
            provider: provider.name().to_string(),
            message: format!("returned {} embeddings for {expected} inputs", embeddings.len()),
        });
    }
    let dimensions = provider.dimensions();
    if let Some((i, bad)) = embeddings.iter().enumerate().find(|(_, e)| e.len() != dimensions) {
        return Err(RagStoreError::Embedding {
            provider: provider.name().to_string(),
            message: format!(
                "embedding {i} has {} dimensions, expected {dimensions}",
                bad.len()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        fn name(&self) -> &str {
            "length"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let embeddings = LengthEmbedder.embed_batch(&["a", "abc", "ab"]).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 1.0], vec![3.0, 1.0], vec![2.0, 1.0]]);
        assert!(check_embeddings(&LengthEmbedder, 3, &embeddings).is_ok());
    }

    #[test]
    fn check_rejects_wrong_count_and_dimensions() {
        let err = check_embeddings(&LengthEmbedder, 2, &[vec![1.0, 1.0]]).unwrap_err();
        assert!(matches!(err, RagStoreError::Embedding { .. }));

        let err = check_embeddings(&LengthEmbedder, 1, &[vec![1.0]]).unwrap_err();
        assert!(matches!(
            err,
            RagStoreError::Embedding { ref message, .. } if message.contains("dimensions")
        ));
    }
}
