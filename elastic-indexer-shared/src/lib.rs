//! # Elastic Indexer Shared
//!
//! This crate defines the domain contract spoken across the elastic indexer
//! ecosystem: document references and their wire format, the capability traits
//! domain types implement to take part in indexing, and the explicit registry
//! mapping document types to their index, write mode and record source.

pub mod errors;
pub mod interfaces;
pub mod registry;
pub mod types;
pub mod utils;

pub use errors::{ProjectionError, RecordLookupError, ReferenceError};
pub use interfaces::{Indexable, RecordSource};
pub use registry::{versioned_index_name, IndexTarget, TypeHandler, TypeRegistry, WriteMode};
pub use types::{
    Aggregation, AggregationBucket, DocumentReference, Operation, SearchHit, SearchPage,
    SearchQuery, DELIMITER, LEGACY_DELIMITER,
};
pub use utils::build_es_id;
