//! # Elastic Indexer
//!
//! The write side of the search pipeline: turns document references into
//! byte-budgeted bulk writes against the search engine and reports which
//! references failed so the job layer can re-drive them.
//!
//! ## Architecture
//!
//! 1. **Bookkeeping**: a deduplicating queue of serialized references and the
//!    batch driver that drains it
//! 2. **Bulk**: resolves each reference to an index, upsert or delete and
//!    buffers the bulk lines within a byte budget
//! 3. **Transport**: the [`BulkTransport`](elastic_indexer_repository::BulkTransport)
//!    the buffered lines are flushed through
//!
//! ## Modules
//!
//! - [`bookkeeping`]: Reference queue and batch execution
//! - [`bulk`]: The bulk indexer
//! - [`config`]: Settings and dependency wiring
//! - [`errors`]: Error types for the indexer
//! - [`telemetry`]: Tracing subscriber setup

pub mod bookkeeping;
pub mod bulk;
pub mod config;
pub mod errors;
pub mod telemetry;

pub use bookkeeping::{
    BookkeepingExecutor, ExecutionSummary, InMemoryReferenceQueue, ReferenceQueue,
};
pub use bulk::{BulkIndexer, DEFAULT_BULK_LIMIT_BYTES};
pub use config::{ConnectionMode, Dependencies, IndexerSettings};
pub use errors::IndexerError;
