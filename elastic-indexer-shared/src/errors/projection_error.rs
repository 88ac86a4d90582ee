//! Outcomes of computing a record's indexed JSON projection that are not a document.

use thiserror::Error;

/// Why a record could not produce its indexed JSON projection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    /// The record should no longer be present in the index. The pipeline turns
    /// this into a delete rather than a failure.
    #[error("Document should no longer be indexed")]
    ShouldNotBeIndexed,

    /// The record could not resolve data its projection depends on.
    #[error("Reference resolution failed: {0}")]
    ReferenceFailed(String),
}

impl ProjectionError {
    /// Create a reference resolution failure.
    pub fn reference_failed(msg: impl Into<String>) -> Self {
        Self::ReferenceFailed(msg.into())
    }
}
