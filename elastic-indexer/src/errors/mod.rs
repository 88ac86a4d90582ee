//! Error types for the elastic indexer write pipeline.

use elastic_indexer_repository::SearchIndexError;
use elastic_indexer_shared::ReferenceError;
use thiserror::Error;

/// Errors that escape the write pipeline.
///
/// Expected races and per-reference failures never surface here; they are
/// folded into the indexer's failure list. What remains are programmer or data
/// errors (a malformed reference, an unregistered type) and infrastructure
/// errors outside a bulk flush.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// A reference could not be parsed or resolved.
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    /// The search engine could not be configured or reached.
    #[error(transparent)]
    SearchIndex(#[from] SearchIndexError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A bulk line could not be serialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl IndexerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }
}
