//! Record source trait definition.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::RecordLookupError;
use crate::interfaces::Indexable;

/// Reads the records of one document type from the system of record.
///
/// Implementations must distinguish a record that is gone (`Ok(None)`,
/// `Ok(false)`) from a lookup that raised (`Err`).
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Look up a single record by primary key.
    async fn find(&self, db_id: &str) -> Result<Option<Arc<dyn Indexable>>, RecordLookupError>;

    /// Look up many records with one query.
    ///
    /// Records that no longer exist are omitted from the result; order is not significant.
    async fn find_many(
        &self,
        db_ids: &[String],
    ) -> Result<Vec<Arc<dyn Indexable>>, RecordLookupError>;

    /// Check whether the record still exists. Called on every operation
    /// resolution, so it must read current storage state.
    async fn exists(&self, db_id: &str) -> Result<bool, RecordLookupError> {
        Ok(self.find(db_id).await?.is_some())
    }
}
