//! Bulk indexer for the elastic indexer.
//!
//! Resolves document references into bulk operations and buffers the encoded
//! lines within a byte budget, flushing through a [`BulkTransport`].

use std::sync::Arc;

use elastic_indexer_repository::{BulkRequest, BulkTransport};
use elastic_indexer_shared::{
    DocumentReference, Operation, ProjectionError, ReferenceError, TypeHandler, TypeRegistry,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::errors::IndexerError;

/// Default byte budget of one bulk call.
pub const DEFAULT_BULK_LIMIT_BYTES: usize = 10 * 1024 * 1024;

/// Version conflicts an upsert retries on before failing.
const RETRY_ON_CONFLICT: u32 = 3;

/// One encoded operation waiting in the buffer.
#[derive(Debug)]
struct BufferedOperation {
    reference: DocumentReference,
    header: String,
    document: Option<String>,
}

impl BufferedOperation {
    /// Serialized size, one newline per line included.
    fn byte_size(&self) -> usize {
        self.header.len() + 1 + self.document.as_ref().map_or(0, |d| d.len() + 1)
    }
}

/// Buffers bulk operations for one batch of references.
///
/// An indexer is stateful and meant for a single logical sequence of
/// [`process`](Self::process) and [`flush`](Self::flush) calls. Failed
/// references are collected in [`failures`](Self::failures) rather than raised,
/// so the caller can decide what to re-enqueue.
pub struct BulkIndexer {
    transport: Arc<dyn BulkTransport>,
    registry: Arc<TypeRegistry>,
    bulk_limit_bytes: usize,
    buffer: Vec<BufferedOperation>,
    buffered_bytes: usize,
    failures: Vec<DocumentReference>,
    integrity_diagnostics: usize,
}

impl BulkIndexer {
    /// Create an indexer with the default byte budget.
    pub fn new(transport: Arc<dyn BulkTransport>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            transport,
            registry,
            bulk_limit_bytes: DEFAULT_BULK_LIMIT_BYTES,
            buffer: Vec::new(),
            buffered_bytes: 0,
            failures: Vec::new(),
            integrity_diagnostics: 0,
        }
    }

    /// Set the byte budget of one bulk call.
    pub fn with_bulk_limit_bytes(mut self, bulk_limit_bytes: usize) -> Self {
        self.bulk_limit_bytes = bulk_limit_bytes;
        self
    }

    /// Resolve a reference and buffer its bulk operation.
    ///
    /// When the new operation would push the buffer past the byte budget, the
    /// buffer is flushed first; an operation larger than the budget is still
    /// sent, alone.
    ///
    /// # Returns
    ///
    /// * `Ok(bytes)` - Bytes the operation added to the buffer, `0` if nothing was buffered
    /// * `Err(IndexerError)` - If the reference's type is unregistered or a line cannot be encoded
    #[instrument(skip(self, reference), fields(reference = %reference))]
    pub async fn process(&mut self, reference: DocumentReference) -> Result<usize, IndexerError> {
        let registry = Arc::clone(&self.registry);
        let handler = registry.handler(reference.class_name())?;

        let Some(operation) = self.resolve(&reference, &registry).await? else {
            return Ok(0);
        };

        let buffered = match operation {
            Operation::Delete => Self::delete_operation(reference, &registry)?,
            Operation::Index | Operation::Upsert => {
                let record = match reference.current_record(&registry).await {
                    Ok(record) => record,
                    Err(e) => return self.record_failure(reference, e),
                };

                let Some(record) = record else {
                    debug!("Record vanished after resolution, deleting");
                    let delete = Self::delete_operation(reference, &registry)?;
                    return self.buffer_operation(delete).await;
                };

                match record.as_indexed_json() {
                    Ok(json) if is_blank(&json) => {
                        warn!(
                            class_name = %reference.class_name(),
                            es_id = %reference.es_id(),
                            "Skipping blank projection"
                        );
                        return Ok(0);
                    }
                    Ok(json) => {
                        self.check_routing(handler, &reference, &json);
                        Self::write_operation(reference, operation, &json, &registry)?
                    }
                    Err(ProjectionError::ShouldNotBeIndexed) => {
                        debug!("Record should no longer be indexed, deleting");
                        Self::delete_operation(reference, &registry)?
                    }
                    Err(ProjectionError::ReferenceFailed(reason)) => {
                        warn!(
                            class_name = %reference.class_name(),
                            es_id = %reference.es_id(),
                            reason = %reason,
                            "Reference failed to resolve"
                        );
                        self.failures.push(reference);
                        return Ok(0);
                    }
                }
            }
        };

        self.buffer_operation(buffered).await
    }

    /// Send the buffered operations in one bulk call.
    ///
    /// Returns the references that failed in this flush; they are also appended
    /// to [`failures`](Self::failures). A transport failure fails every buffered
    /// reference. The buffer is empty afterwards either way.
    #[instrument(skip(self), fields(operations = self.buffer.len(), bytes = self.buffered_bytes))]
    pub async fn flush(&mut self) -> Vec<DocumentReference> {
        if self.buffer.is_empty() {
            return Vec::new();
        }

        let buffer = std::mem::take(&mut self.buffer);
        let bytes = std::mem::replace(&mut self.buffered_bytes, 0);

        let mut references = Vec::with_capacity(buffer.len());
        let mut request = BulkRequest::new();
        for operation in buffer {
            request.push(operation.header, operation.document);
            references.push(operation.reference);
        }

        let failed: Vec<DocumentReference> = match self.transport.bulk(&request).await {
            Ok(summary) => {
                let mut failed = Vec::new();
                for (position, reference) in references.into_iter().enumerate() {
                    match summary.items.get(position) {
                        Some(item) if !item.is_success() => {
                            warn!(
                                es_id = %reference.es_id(),
                                status = item.status,
                                error = item.error.as_deref().unwrap_or("unknown"),
                                "Bulk item failed"
                            );
                            failed.push(reference);
                        }
                        None if summary.errors => failed.push(reference),
                        _ => {}
                    }
                }

                info!(
                    operations = request.operations,
                    bytes = bytes,
                    failed = failed.len(),
                    took_ms = summary.took,
                    "Flushed bulk buffer"
                );
                failed
            }
            Err(e) => {
                error!(
                    error = %e,
                    operations = request.operations,
                    bytes = bytes,
                    "Bulk call failed"
                );
                references
            }
        };

        self.failures.extend(failed.iter().cloned());
        failed
    }

    /// Every reference that failed since the indexer was created.
    pub fn failures(&self) -> &[DocumentReference] {
        &self.failures
    }

    /// Take the accumulated failures, leaving the list empty.
    pub fn take_failures(&mut self) -> Vec<DocumentReference> {
        std::mem::take(&mut self.failures)
    }

    /// Number of projections found missing their routing key.
    pub fn integrity_diagnostics(&self) -> usize {
        self.integrity_diagnostics
    }

    /// Bytes currently buffered.
    pub fn buffered_bytes(&self) -> usize {
        self.buffered_bytes
    }

    /// Operations currently buffered.
    pub fn buffered_operations(&self) -> usize {
        self.buffer.len()
    }

    pub fn bulk_limit_bytes(&self) -> usize {
        self.bulk_limit_bytes
    }

    /// Resolve the operation, folding lookup failures into `failures`.
    async fn resolve(
        &mut self,
        reference: &DocumentReference,
        registry: &TypeRegistry,
    ) -> Result<Option<Operation>, IndexerError> {
        match reference.operation(registry).await {
            Ok(operation) => Ok(Some(operation)),
            Err(ReferenceError::Lookup(e)) => {
                warn!(es_id = %reference.es_id(), error = %e, "Record lookup failed");
                self.failures.push(reference.clone());
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_failure(
        &mut self,
        reference: DocumentReference,
        e: ReferenceError,
    ) -> Result<usize, IndexerError> {
        match e {
            ReferenceError::Lookup(e) => {
                warn!(es_id = %reference.es_id(), error = %e, "Record lookup failed");
                self.failures.push(reference);
                Ok(0)
            }
            other => Err(other.into()),
        }
    }

    async fn buffer_operation(
        &mut self,
        operation: BufferedOperation,
    ) -> Result<usize, IndexerError> {
        let bytes = operation.byte_size();

        if !self.buffer.is_empty() && self.buffered_bytes + bytes > self.bulk_limit_bytes {
            debug!(
                buffered_bytes = self.buffered_bytes,
                bytes = bytes,
                limit = self.bulk_limit_bytes,
                "Bulk budget reached, flushing"
            );
            self.flush().await;
        }

        debug!(es_id = %operation.reference.es_id(), bytes = bytes, "Buffered operation");
        self.buffered_bytes += bytes;
        self.buffer.push(operation);
        Ok(bytes)
    }

    fn check_routing(
        &mut self,
        handler: &TypeHandler,
        reference: &DocumentReference,
        json: &Value,
    ) {
        let Some(field) = handler.routing_field() else {
            return;
        };

        if json.get(field).map_or(true, Value::is_null) {
            self.integrity_diagnostics += 1;
            warn!(
                target: "elastic_indexer::integrity",
                class_name = %reference.class_name(),
                es_id = %reference.es_id(),
                routing_field = %field,
                "Projection is missing its routing key"
            );
        }
    }

    fn delete_operation(
        reference: DocumentReference,
        registry: &TypeRegistry,
    ) -> Result<BufferedOperation, IndexerError> {
        let index = reference.index_name_for(Operation::Delete, registry)?;
        let header = encode(&header_line(Operation::Delete, &index, &reference))?;
        Ok(BufferedOperation {
            reference,
            header,
            document: None,
        })
    }

    fn write_operation(
        reference: DocumentReference,
        operation: Operation,
        json: &Value,
        registry: &TypeRegistry,
    ) -> Result<BufferedOperation, IndexerError> {
        let index = reference.index_name_for(operation, registry)?;
        let header = encode(&header_line(operation, &index, &reference))?;
        let document = match operation {
            Operation::Upsert => encode(&json!({ "doc": json, "doc_as_upsert": true }))?,
            _ => encode(json)?,
        };
        Ok(BufferedOperation {
            reference,
            header,
            document: Some(document),
        })
    }
}

impl std::fmt::Debug for BulkIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkIndexer")
            .field("bulk_limit_bytes", &self.bulk_limit_bytes)
            .field("buffered_operations", &self.buffer.len())
            .field("buffered_bytes", &self.buffered_bytes)
            .field("failures", &self.failures.len())
            .finish_non_exhaustive()
    }
}

/// The metadata line of a bulk operation.
fn header_line(operation: Operation, index: &str, reference: &DocumentReference) -> Value {
    let mut meta = Map::new();
    meta.insert("_index".to_string(), json!(index));
    meta.insert("_id".to_string(), json!(reference.es_id()));
    if let Some(routing) = reference.es_parent() {
        meta.insert("routing".to_string(), json!(routing));
    }
    if operation == Operation::Upsert {
        meta.insert("retry_on_conflict".to_string(), json!(RETRY_ON_CONFLICT));
    }

    let mut line = Map::new();
    line.insert(operation.bulk_action().to_string(), Value::Object(meta));
    Value::Object(line)
}

fn encode(value: &Value) -> Result<String, IndexerError> {
    serde_json::to_string(value).map_err(|e| IndexerError::serialization(e.to_string()))
}

fn is_blank(json: &Value) -> bool {
    match json {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}
