//! Core data structures shared by the write pipeline and the query side.

pub mod document_reference;
pub mod operation;
pub mod search_query;
pub mod search_result;

pub use document_reference::{DocumentReference, DELIMITER, LEGACY_DELIMITER};
pub use operation::Operation;
pub use search_query::SearchQuery;
pub use search_result::{Aggregation, AggregationBucket, SearchHit, SearchPage};
