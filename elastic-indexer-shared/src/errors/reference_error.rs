//! Reference error types.
//!
//! These cover malformed references, unsupported operation values, unregistered
//! document types and failures raised while reading the system of record.

use thiserror::Error;

/// Raised by a [`RecordSource`](crate::RecordSource) when the lookup itself fails.
///
/// A record that simply no longer exists is not an error: sources report it as
/// `Ok(None)` (or `Ok(false)` for existence checks).
#[derive(Debug, Clone, Error)]
#[error("Record lookup failed for {class_name}: {message}")]
pub struct RecordLookupError {
    /// The document type whose source raised.
    pub class_name: String,
    /// Description of the underlying failure.
    pub message: String,
}

impl RecordLookupError {
    /// Create a lookup error for the given document type.
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }
}

/// Errors raised while building, parsing or resolving a document reference.
#[derive(Debug, Clone, Error)]
pub enum ReferenceError {
    /// The reference fields or serialized form are malformed.
    #[error("Invalid reference: {0}")]
    Invalid(String),

    /// An operation value outside `index`, `upsert` and `delete`.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// No handler is registered for the reference's class name.
    #[error("Unknown document type: {0}")]
    UnknownClass(String),

    /// The system of record raised while resolving the reference.
    #[error(transparent)]
    Lookup(#[from] RecordLookupError),
}

impl ReferenceError {
    /// Create an invalid reference error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported_operation(value: impl Into<String>) -> Self {
        Self::UnsupportedOperation(value.into())
    }

    /// Create an unknown document type error.
    pub fn unknown_class(class_name: impl Into<String>) -> Self {
        Self::UnknownClass(class_name.into())
    }
}
