//! OpenSearch implementation of the bulk transport.

mod bulk_transport;

pub use bulk_transport::OpenSearchBulkTransport;
