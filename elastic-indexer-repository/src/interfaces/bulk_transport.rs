//! Bulk transport trait definition.

use async_trait::async_trait;

use crate::errors::SearchIndexError;
use crate::types::{BulkRequest, BulkResponseSummary};

/// Sends bulk write calls to the search engine.
///
/// Implementations perform exactly one logical bulk call per invocation (retries
/// of that same call included) and report per-item outcomes in request order.
#[async_trait]
pub trait BulkTransport: Send + Sync {
    /// Submit a bulk request.
    ///
    /// # Returns
    ///
    /// * `Ok(BulkResponseSummary)` - The engine accepted the call; items may still have failed
    /// * `Err(SearchIndexError)` - The whole call failed and no outcome is known
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponseSummary, SearchIndexError>;
}
