//! Indexable record trait definition.

use serde_json::Value;

use crate::errors::ProjectionError;

/// A domain record that can be written to the search index.
///
/// The pipeline only ever reads a record through these accessors; it never
/// inspects the record's concrete type.
pub trait Indexable: Send + Sync {
    /// The registry key of the record's document type (e.g. `"Issue"`).
    fn class_name(&self) -> &str;

    /// Primary key in the system of record.
    fn db_id(&self) -> String;

    /// External document id. May differ from `db_id`, e.g. `issue_7`.
    fn es_id(&self) -> String;

    /// Routing key used for shard co-location, `None` for top-level documents.
    fn es_parent(&self) -> Option<String>;

    /// Compute the JSON document stored in the index for this record.
    ///
    /// # Returns
    ///
    /// * `Ok(Value)` - The indexed projection (may be blank, which skips the write)
    /// * `Err(ProjectionError::ShouldNotBeIndexed)` - The record must be removed from the index
    /// * `Err(ProjectionError::ReferenceFailed)` - The record could not resolve its payload
    fn as_indexed_json(&self) -> Result<Value, ProjectionError>;
}
