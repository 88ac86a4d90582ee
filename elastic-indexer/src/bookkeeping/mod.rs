//! Bookkeeping for references waiting to be indexed.
//!
//! Changed records are tracked as serialized references in a
//! [`ReferenceQueue`]; a [`BookkeepingExecutor`] drains it in batches, whole or
//! shard by shard, and puts failed references back.

mod executor;
mod queue;

pub use executor::{BookkeepingExecutor, ExecutionSummary};
pub use queue::{
    shard_number, InMemoryReferenceQueue, ReferenceQueue, DEFAULT_NUMBER_OF_SHARDS,
};
