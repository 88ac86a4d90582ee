//! Search index error types.
//!
//! This module defines the unified error type for everything that talks to the
//! search engine: client construction, credential resolution, bulk writes and
//! queries.

use thiserror::Error;

/// Unified errors from search index operations.
///
/// Used by the `BulkTransport` trait, the client builder and the results adapter.
/// Transport-level failures (the engine could not be reached or answered the
/// whole call with an error status) are kept apart from per-item bulk failures,
/// which are reported inside a successful bulk response instead.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., an invalid query or missing parameters).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Client parameters could not be turned into a client.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// No usable credentials could be resolved or a provider failed.
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// Failed to establish connection to the search engine.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The request reached the engine but the whole call failed.
    #[error("Transport error: {0}")]
    TransportError(String),

    /// A bulk call was rejected as a whole.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// A search request failed.
    #[error("Search error: {0}")]
    SearchError(String),

    /// Failed to parse response from the search engine.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search engine.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::ConfigurationError(msg.into())
    }

    /// Create a credential error.
    pub fn credential(msg: impl Into<String>) -> Self {
        Self::CredentialError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a search error.
    pub fn search(msg: impl Into<String>) -> Self {
        Self::SearchError(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Returns true if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SearchIndexError::ConnectionError(_) | SearchIndexError::TransportError(_)
        )
    }
}
