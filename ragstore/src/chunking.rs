//! Text chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`SentenceChunker`]: packs whole sentences up to a token budget, carrying
//!   trailing sentences into the next chunk
//! - [`FixedSizeChunker`]: character windows with a fixed overlap
//!
//! Chunkers only produce ordered text spans. Position in the returned `Vec`
//! is the span's `chunk_index`.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{RagStoreError, Result};

/// Sentence-ending punctuation followed by whitespace.
static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("sentence boundary pattern is valid"));

/// Rough token estimate: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// A strategy for splitting text into ordered chunks.
pub trait Chunker: Send + Sync {
    /// Split text into chunks, in reading order.
    ///
    /// Returns an empty `Vec` if the text is empty or only whitespace.
    fn chunk(&self, text: &str) -> Vec<String>;
}

fn check_sizes(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagStoreError::Config("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagStoreError::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Split text into sentences, keeping each sentence's terminal punctuation.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for boundary in SENTENCE_BOUNDARY.find_iter(text) {
        // The punctuation is a single ASCII byte.
        sentences.push(&text[start..boundary.start() + 1]);
        start = boundary.end();
    }
    sentences.push(&text[start..]);
    sentences.retain(|s| !s.trim().is_empty());
    sentences
}

/// Packs whole sentences into chunks of at most `chunk_size` estimated tokens.
///
/// A single sentence longer than the budget becomes its own chunk. When a
/// chunk is closed, the trailing sentences of that chunk totalling at most
/// `chunk_overlap` tokens start the next one. The budget is strict: if the
/// last sentence alone exceeds `chunk_overlap`, nothing is carried over and
/// the next chunk starts fresh.
///
/// # Example
///
/// ```rust,ignore
/// use ragstore::SentenceChunker;
///
/// let chunker = SentenceChunker::new(500, 50)?;
/// let chunks = chunker.chunk(&text);
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: token budget per chunk
    /// * `chunk_overlap`: token budget carried over between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagStoreError::Config`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut overlap: VecDeque<&str> = VecDeque::new();

        for sentence in split_sentences(text) {
            let sentence = sentence.trim();
            if estimate_tokens(&current) + estimate_tokens(sentence) > self.chunk_size
                && !current.is_empty()
            {
                chunks.push(current.trim().to_string());
                current.clear();
                for carried in &overlap {
                    current.push_str(carried);
                    current.push(' ');
                }
            }

            current.push_str(sentence);
            current.push(' ');

            overlap.push_back(sentence);
            while !overlap.is_empty()
                && estimate_tokens(&overlap.iter().copied().collect::<Vec<_>>().join(" "))
                    > self.chunk_overlap
            {
                overlap.pop_front();
            }
        }

        let last = current.trim();
        if !last.is_empty() {
            chunks.push(last.to_string());
        }
        chunks
    }
}

/// Cuts text into windows of `chunk_size` characters, each starting
/// `chunk_size - chunk_overlap` characters after the previous one.
///
/// Windows never split a multi-byte character.
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a chunker with windows of `chunk_size` characters sharing
    /// `chunk_overlap` characters with their neighbor.
    ///
    /// Fails with [`RagStoreError::Config`] under the same rules as
    /// [`SentenceChunker::new`].
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        check_sizes(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            if end == char_count {
                break;
            }
            start += step;
        }
        chunks
    }
}
