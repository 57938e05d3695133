//! Error types for the `ragstore` crate.

use thiserror::Error;

/// Errors that can occur in store operations.
///
/// Every failure is propagated as one of these variants; the store never
/// returns a partial result alongside an error.
#[derive(Debug, Error)]
pub enum RagStoreError {
    /// A required connection parameter is missing or malformed.
    ///
    /// Raised before any I/O is attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database session could not be established or was lost.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Caller-supplied input violates a precondition. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A persistence operation failed after validation. The transaction was
    /// rolled back, so no partial state is visible.
    #[error("Write error ({operation}): {message}")]
    Write {
        /// The store operation that failed.
        operation: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A similarity search or read failed.
    #[error("Query error: {0}")]
    Query(String),

    /// The embedding provider failed or returned malformed vectors.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagStoreError {
    /// Shorthand for a [`RagStoreError::Write`] on the given operation.
    pub fn write(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Write { operation, message: message.into() }
    }

    /// Whether retrying the operation on a fresh connection may succeed.
    ///
    /// Only connection failures are retryable; validation, write and query
    /// failures are fatal to the operation that raised them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A convenience result type for store operations.
pub type Result<T> = std::result::Result<T, RagStoreError>;
