//! Cosine similarity math and result ranking.
//!
//! Mirrors pgvector's `<=>` operator so the in-memory backend ranks exactly
//! like the PostgreSQL backend: similarity is `1 - cosine_distance`, results
//! must strictly exceed the threshold, and ties on distance are broken by
//! ascending chunk id.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::document::ChunkId;
use crate::error::{RagStoreError, Result};

/// Cosine distance between two vectors, in `[0, 2]`.
///
/// Returns `NaN` when either vector has zero magnitude, as pgvector does; a
/// `NaN` similarity never passes a threshold filter.
///
/// # Errors
///
/// Returns [`RagStoreError::Query`] if the vectors differ in dimensionality.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(RagStoreError::Query(format!(
            "different vector dimensions {} and {}",
            a.len(),
            b.len()
        )));
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let similarity = dot / (norm_a * norm_b).sqrt();
    // Rounding can push the ratio slightly outside [-1, 1].
    Ok(1.0 - similarity.clamp(-1.0, 1.0))
}

/// A chunk that passed the threshold, with its distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    /// The candidate's chunk id, used to break distance ties.
    pub chunk_id: ChunkId,
    /// Cosine distance to the query.
    pub distance: f64,
    /// The candidate itself.
    pub item: T,
}

impl<T> Scored<T> {
    /// `1 - distance`.
    pub fn similarity(&self) -> f64 {
        1.0 - self.distance
    }
}

/// Score candidates against a query and keep the best `top_k` whose
/// similarity strictly exceeds `threshold`.
///
/// Results are ordered by ascending distance (descending similarity), ties by
/// ascending chunk id.
///
/// # Errors
///
/// Returns [`RagStoreError::Query`] on the first candidate whose embedding
/// dimensionality differs from the query's. No partial list is returned.
pub fn rank<'a, T, I>(
    query: &[f32],
    top_k: usize,
    threshold: f64,
    candidates: I,
) -> Result<Vec<Scored<T>>>
where
    I: IntoIterator<Item = (ChunkId, &'a [f32], T)>,
{
    let mut eligible = Vec::new();
    for (chunk_id, embedding, item) in candidates {
        let distance = cosine_distance(embedding, query)?;
        if 1.0 - distance > threshold {
            eligible.push(Scored { chunk_id, distance, item });
        }
    }

    eligible.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
        Ordering::Equal => a.chunk_id.cmp(&b.chunk_id),
        other => other,
    });
    eligible.truncate(top_k);
    Ok(eligible)
}

/// Render an embedding in pgvector's text input format, e.g. `[1,0.5,-2]`.
pub fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 8 + 2);
    out.push('[');
    for (i, value) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Display for f32 is the shortest representation that round-trips.
        let _ = write!(out, "{value}");
    }
    out.push(']');
    out
}

/// Parse pgvector's text output format back into an embedding.
///
/// # Errors
///
/// Returns [`RagStoreError::Query`] if the text is not a bracketed list of
/// numbers.
pub fn parse_vector_literal(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| RagStoreError::Query(format!("malformed vector literal: {text}")))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f32>()
                .map_err(|e| RagStoreError::Query(format!("malformed vector component '{v}': {e}")))
        })
        .collect()
}
