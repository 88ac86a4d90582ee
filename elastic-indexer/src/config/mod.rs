//! Configuration and dependency initialization.

mod dependencies;
mod settings;

pub use dependencies::Dependencies;
pub use settings::{ConnectionMode, IndexerSettings, DEFAULT_BATCH_LIMIT};
