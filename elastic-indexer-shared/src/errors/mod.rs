//! Error types for document references and record resolution.

mod projection_error;
mod reference_error;

pub use projection_error::ProjectionError;
pub use reference_error::{RecordLookupError, ReferenceError};
