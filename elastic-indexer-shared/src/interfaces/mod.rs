//! Capability traits implemented by the domain types that take part in indexing.
//!
//! Each domain type implements [`Indexable`] for its records and provides a
//! [`RecordSource`] that reads them back from the system of record. Both are wired
//! together per class name in the [`TypeRegistry`](crate::TypeRegistry).

mod indexable;
mod record_source;

pub use indexable::Indexable;
pub use record_source::RecordSource;
