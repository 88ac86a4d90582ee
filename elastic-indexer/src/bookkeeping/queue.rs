//! Queue of serialized references awaiting indexing.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use elastic_indexer_shared::DocumentReference;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::errors::IndexerError;

/// Shards a queue is partitioned into unless configured otherwise.
pub const DEFAULT_NUMBER_OF_SHARDS: usize = 16;

/// The shard a serialized reference belongs to.
///
/// Derived from a SHA-256 digest of the entry, so the assignment is stable
/// across processes and releases.
pub fn shard_number(entry: &str, number_of_shards: usize) -> usize {
    let digest = Sha256::digest(entry.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % number_of_shards.max(1) as u64) as usize
}

/// An ordered, deduplicating queue of serialized references.
///
/// Tracking an entry that is already queued moves it to the back instead of
/// adding a second copy. Entries are partitioned into shards so several
/// workers can drain disjoint parts of the queue.
#[async_trait]
pub trait ReferenceQueue: Send + Sync {
    /// Number of shards entries are partitioned into.
    fn number_of_shards(&self) -> usize;

    /// Enqueue serialized references. Returns the number tracked.
    async fn track(&self, serialized: Vec<String>) -> Result<usize, IndexerError>;

    /// Enqueue references.
    async fn track_references(
        &self,
        references: &[DocumentReference],
    ) -> Result<usize, IndexerError> {
        self.track(references.iter().map(DocumentReference::serialize).collect())
            .await
    }

    /// Remove and return up to `limit` entries from the front, across all shards.
    async fn pop_batch(&self, limit: usize) -> Result<Vec<String>, IndexerError> {
        let shards: Vec<usize> = (0..self.number_of_shards()).collect();
        self.pop_batch_from(&shards, limit).await
    }

    /// Remove and return up to `limit` entries from the front of the given shards.
    ///
    /// Shard numbers outside the queue's range match nothing.
    async fn pop_batch_from(
        &self,
        shards: &[usize],
        limit: usize,
    ) -> Result<Vec<String>, IndexerError>;

    /// Number of queued entries.
    async fn queue_size(&self) -> Result<usize, IndexerError>;

    /// Every queued entry, front first.
    async fn queued_items(&self) -> Result<Vec<String>, IndexerError>;

    /// The queued entries of one shard, front first.
    async fn shard_items(&self, shard: usize) -> Result<Vec<String>, IndexerError>;

    /// Drop every queued entry.
    async fn clear_tracking(&self) -> Result<(), IndexerError>;
}

#[derive(Debug, Default)]
struct QueueState {
    by_score: BTreeMap<u64, (usize, String)>,
    scores: HashMap<String, u64>,
    next_score: u64,
}

/// In-process [`ReferenceQueue`], ordered by a monotonic score.
#[derive(Debug)]
pub struct InMemoryReferenceQueue {
    number_of_shards: usize,
    state: Mutex<QueueState>,
}

impl Default for InMemoryReferenceQueue {
    fn default() -> Self {
        Self::with_shards(DEFAULT_NUMBER_OF_SHARDS)
    }
}

impl InMemoryReferenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue partitioned into `number_of_shards` shards (at least one).
    pub fn with_shards(number_of_shards: usize) -> Self {
        Self {
            number_of_shards: number_of_shards.max(1),
            state: Mutex::new(QueueState::default()),
        }
    }
}

#[async_trait]
impl ReferenceQueue for InMemoryReferenceQueue {
    fn number_of_shards(&self) -> usize {
        self.number_of_shards
    }

    async fn track(&self, serialized: Vec<String>) -> Result<usize, IndexerError> {
        let mut state = self.state.lock().await;
        let count = serialized.len();

        for entry in serialized {
            let score = state.next_score;
            state.next_score += 1;

            if let Some(previous) = state.scores.insert(entry.clone(), score) {
                state.by_score.remove(&previous);
            }
            let shard = shard_number(&entry, self.number_of_shards);
            state.by_score.insert(score, (shard, entry));
        }

        Ok(count)
    }

    async fn pop_batch_from(
        &self,
        shards: &[usize],
        limit: usize,
    ) -> Result<Vec<String>, IndexerError> {
        let mut state = self.state.lock().await;

        let picked: Vec<u64> = state
            .by_score
            .iter()
            .filter(|(_, (shard, _))| shards.contains(shard))
            .map(|(score, _)| *score)
            .take(limit)
            .collect();

        let mut batch = Vec::with_capacity(picked.len());
        for score in picked {
            if let Some((_, entry)) = state.by_score.remove(&score) {
                state.scores.remove(&entry);
                batch.push(entry);
            }
        }

        Ok(batch)
    }

    async fn queue_size(&self) -> Result<usize, IndexerError> {
        Ok(self.state.lock().await.by_score.len())
    }

    async fn queued_items(&self) -> Result<Vec<String>, IndexerError> {
        Ok(self
            .state
            .lock()
            .await
            .by_score
            .values()
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn shard_items(&self, shard: usize) -> Result<Vec<String>, IndexerError> {
        Ok(self
            .state
            .lock()
            .await
            .by_score
            .values()
            .filter(|(entry_shard, _)| *entry_shard == shard)
            .map(|(_, entry)| entry.clone())
            .collect())
    }

    async fn clear_tracking(&self) -> Result<(), IndexerError> {
        let mut state = self.state.lock().await;
        state.by_score.clear();
        state.scores.clear();
        Ok(())
    }
}
