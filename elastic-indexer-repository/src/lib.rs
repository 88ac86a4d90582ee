//! # Elastic Indexer Repository
//!
//! This crate holds everything that talks to the search engine: client
//! construction from configuration (including AWS request signing), the
//! [`BulkTransport`] seam the write pipeline depends on together with its
//! OpenSearch implementation, and the query-side [`SearchResultsAdapter`].

pub mod client;
pub mod config;
pub mod errors;
pub mod interfaces;
pub mod opensearch;
pub mod results;
pub mod types;

pub use client::{build_client, CredentialContext, SearchClient};
pub use config::{ClientParams, RetryOnFailure, RuntimeEnvironment};
pub use errors::SearchIndexError;
pub use interfaces::BulkTransport;
pub use opensearch::OpenSearchBulkTransport;
pub use results::SearchResultsAdapter;
pub use types::{BulkItemOutcome, BulkRequest, BulkResponseSummary};
