//! Interface definitions for the search engine seams.
//!
//! The write pipeline depends on [`BulkTransport`] only, so it can be exercised
//! against recording or failing transports without a live engine.

mod bulk_transport;

pub use bulk_transport::BulkTransport;
