//! Batch driver draining a [`ReferenceQueue`] through a [`BulkIndexer`].

use std::sync::Arc;

use elastic_indexer_repository::BulkTransport;
use elastic_indexer_shared::{DocumentReference, TypeRegistry};
use tracing::{error, info, instrument, warn};

use super::ReferenceQueue;
use crate::bulk::{BulkIndexer, DEFAULT_BULK_LIMIT_BYTES};
use crate::errors::IndexerError;

/// Outcome of one [`BookkeepingExecutor::execute`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Valid references taken off the queue and processed.
    pub processed: usize,
    /// References that failed and were tracked again.
    pub failures: usize,
}

/// Pops batches of serialized references and indexes them.
///
/// Every run uses a fresh [`BulkIndexer`]. References that fail are tracked
/// again. Malformed entries and entries naming an unregistered type are logged
/// and dropped. If the batch raises, every valid entry popped for it is tracked
/// again before the error is returned.
pub struct BookkeepingExecutor {
    queue: Arc<dyn ReferenceQueue>,
    transport: Arc<dyn BulkTransport>,
    registry: Arc<TypeRegistry>,
    bulk_limit_bytes: usize,
}

impl BookkeepingExecutor {
    pub fn new(
        queue: Arc<dyn ReferenceQueue>,
        transport: Arc<dyn BulkTransport>,
        registry: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            queue,
            transport,
            registry,
            bulk_limit_bytes: DEFAULT_BULK_LIMIT_BYTES,
        }
    }

    /// Set the byte budget of the indexers this executor creates.
    pub fn with_bulk_limit_bytes(mut self, bulk_limit_bytes: usize) -> Self {
        self.bulk_limit_bytes = bulk_limit_bytes;
        self
    }

    /// Index up to `limit` queued references.
    #[instrument(skip(self))]
    pub async fn execute(&self, limit: usize) -> Result<ExecutionSummary, IndexerError> {
        let entries = self.queue.pop_batch(limit).await?;
        self.run(entries).await
    }

    /// Index up to `limit` queued references from the given shards only.
    #[instrument(skip(self))]
    pub async fn execute_shards(
        &self,
        shards: &[usize],
        limit: usize,
    ) -> Result<ExecutionSummary, IndexerError> {
        let entries = self.queue.pop_batch_from(shards, limit).await?;
        self.run(entries).await
    }

    async fn run(&self, entries: Vec<String>) -> Result<ExecutionSummary, IndexerError> {
        if entries.is_empty() {
            return Ok(ExecutionSummary::default());
        }

        let mut references = Vec::with_capacity(entries.len());
        let mut valid_entries = Vec::with_capacity(entries.len());
        for entry in entries {
            match DocumentReference::deserialize(&entry) {
                Ok(reference) if self.registry.contains(reference.class_name()) => {
                    references.push(reference);
                    valid_entries.push(entry);
                }
                Ok(reference) => warn!(
                    entry = %entry,
                    class_name = %reference.class_name(),
                    "Discarding reference to unregistered type"
                ),
                Err(e) => warn!(entry = %entry, error = %e, "Discarding malformed reference"),
            }
        }

        match self.index(&references).await {
            Ok(failures) => {
                if !failures.is_empty() {
                    self.queue.track_references(&failures).await?;
                }

                let summary = ExecutionSummary {
                    processed: references.len(),
                    failures: failures.len(),
                };
                info!(
                    processed = summary.processed,
                    failures = summary.failures,
                    "Executed bookkeeping batch"
                );
                Ok(summary)
            }
            Err(e) => {
                error!(
                    error = %e,
                    count = valid_entries.len(),
                    "Bookkeeping batch failed, requeueing"
                );
                self.queue.track(valid_entries).await?;
                Err(e)
            }
        }
    }

    async fn index(
        &self,
        references: &[DocumentReference],
    ) -> Result<Vec<DocumentReference>, IndexerError> {
        if references.is_empty() {
            return Ok(Vec::new());
        }

        DocumentReference::preload(references, &self.registry).await?;

        let mut indexer = BulkIndexer::new(self.transport.clone(), self.registry.clone())
            .with_bulk_limit_bytes(self.bulk_limit_bytes);

        for reference in references {
            indexer.process(reference.clone()).await?;
        }
        indexer.flush().await;

        Ok(indexer.take_failures())
    }
}
