//! Integration tests for the write pipeline.
//!
//! These tests run the real BulkIndexer and BookkeepingExecutor against an
//! in-memory record store and a recording transport, so no search engine is
//! needed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use elastic_indexer::bookkeeping::shard_number;
use elastic_indexer::{
    BookkeepingExecutor, BulkIndexer, ExecutionSummary, InMemoryReferenceQueue, IndexerError,
    ReferenceQueue,
};
use elastic_indexer_repository::{
    BulkItemOutcome, BulkRequest, BulkResponseSummary, BulkTransport, SearchIndexError,
};
use elastic_indexer_shared::{
    build_es_id, DocumentReference, IndexTarget, Indexable, ProjectionError, RecordLookupError,
    RecordSource, ReferenceError, TypeHandler, TypeRegistry, WriteMode,
};

// Domain record used by every test
struct Issue {
    id: u64,
    project_id: u64,
    title: String,
}

impl Indexable for Issue {
    fn class_name(&self) -> &str {
        "Issue"
    }

    fn db_id(&self) -> String {
        self.id.to_string()
    }

    fn es_id(&self) -> String {
        build_es_id("issue", self.id)
    }

    fn es_parent(&self) -> Option<String> {
        Some(build_es_id("project", self.project_id))
    }

    fn as_indexed_json(&self) -> Result<Value, ProjectionError> {
        Ok(json!({
            "id": self.id,
            "project_id": self.project_id,
            "title": self.title,
        }))
    }
}

// In-memory system of record
#[derive(Default)]
struct IssueStore {
    issues: Mutex<HashMap<String, Arc<dyn Indexable>>>,
    find_many_calls: AtomicUsize,
    batch_lookups_fail: AtomicBool,
}

impl IssueStore {
    fn with_issues(count: u64, title_len: usize) -> Arc<Self> {
        let store = Arc::new(Self::default());
        for id in 1..=count {
            store.insert(id, title_len);
        }
        store
    }

    fn insert(&self, id: u64, title_len: usize) {
        let issue: Arc<dyn Indexable> = Arc::new(Issue {
            id,
            project_id: 1,
            title: "x".repeat(title_len),
        });
        self.issues.lock().unwrap().insert(id.to_string(), issue);
    }

    fn remove(&self, id: u64) {
        self.issues.lock().unwrap().remove(&id.to_string());
    }
}

#[async_trait]
impl RecordSource for IssueStore {
    async fn find(
        &self,
        db_id: &str,
    ) -> Result<Option<Arc<dyn Indexable>>, RecordLookupError> {
        Ok(self.issues.lock().unwrap().get(db_id).cloned())
    }

    async fn find_many(
        &self,
        db_ids: &[String],
    ) -> Result<Vec<Arc<dyn Indexable>>, RecordLookupError> {
        self.find_many_calls.fetch_add(1, Ordering::SeqCst);
        if self.batch_lookups_fail.load(Ordering::SeqCst) {
            return Err(RecordLookupError::new("Issue", "replica unavailable"));
        }
        let issues = self.issues.lock().unwrap();
        Ok(db_ids.iter().filter_map(|id| issues.get(id).cloned()).collect())
    }
}

// Mock transport recording every bulk call
#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<BulkRequest>>,
    fail_transport: AtomicBool,
    rejected_ids: Mutex<Vec<String>>,
}

impl RecordingTransport {
    fn failing() -> Arc<Self> {
        let transport = Self::default();
        transport.fail_transport.store(true, Ordering::SeqCst);
        Arc::new(transport)
    }

    fn rejecting(ids: &[&str]) -> Arc<Self> {
        let transport = Self::default();
        *transport.rejected_ids.lock().unwrap() = ids.iter().map(|s| s.to_string()).collect();
        Arc::new(transport)
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> BulkRequest {
        self.requests.lock().unwrap()[n].clone()
    }

    /// Parsed metadata lines of every call, in order.
    fn headers(&self) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .flat_map(|request| request.lines.iter())
            .map(|line| serde_json::from_str::<Value>(line).unwrap())
            .filter(|line| {
                ["index", "update", "delete"]
                    .iter()
                    .any(|action| line.get(*action).is_some())
            })
            .collect()
    }
}

#[async_trait]
impl BulkTransport for RecordingTransport {
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponseSummary, SearchIndexError> {
        self.requests.lock().unwrap().push(request.clone());

        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(SearchIndexError::connection("connection refused"));
        }

        let rejected = self.rejected_ids.lock().unwrap().clone();
        let mut items = Vec::new();
        for line in &request.lines {
            let line: Value = serde_json::from_str(line).unwrap();
            let Some((action, meta)) = line.as_object().and_then(|o| o.iter().next()) else {
                continue;
            };
            let is_write = ["index", "update", "delete"].contains(&action.as_str());
            if !is_write || meta.get("_id").is_none() {
                continue;
            }
            let id = meta["_id"].as_str().unwrap().to_string();
            let failed = rejected.contains(&id);
            items.push(BulkItemOutcome {
                action: action.clone(),
                index: meta["_index"].as_str().map(str::to_string),
                id: Some(id),
                status: if failed { 400 } else { 200 },
                error: failed.then(|| "mapper_parsing_exception".to_string()),
            });
        }

        Ok(BulkResponseSummary {
            took: 1,
            errors: items.iter().any(|item| !item.is_success()),
            items,
        })
    }
}

fn registry(store: Arc<IssueStore>) -> Arc<TypeRegistry> {
    Arc::new(TypeRegistry::new().register(
        "Issue",
        TypeHandler::new(IndexTarget::versioned("issues", 1), store)
            .with_write_mode(WriteMode::Upsert)
            .with_routing_field("project_id"),
    ))
}

fn issue_ref(id: u64) -> DocumentReference {
    DocumentReference::new(
        "Issue",
        id.to_string(),
        build_es_id("issue", id),
        Some(build_es_id("project", 1)),
    )
    .unwrap()
}

/// Bytes one upsert of an issue with the given title length contributes.
async fn operation_size(title_len: usize) -> usize {
    let store = IssueStore::with_issues(1, title_len);
    let mut indexer = BulkIndexer::new(Arc::new(RecordingTransport::default()), registry(store));
    indexer.process(issue_ref(1)).await.unwrap()
}

#[test]
fn test_round_trip_and_dual_delimiters() {
    let canonical = DocumentReference::deserialize("Issue 7 issue_7 5").unwrap();
    let legacy = DocumentReference::deserialize("Issue|7|issue_7|5").unwrap();
    assert_eq!(canonical, legacy);

    for reference in [issue_ref(1), issue_ref(42), canonical] {
        assert_eq!(
            DocumentReference::deserialize(&reference.serialize()).unwrap(),
            reference
        );
    }
}

#[tokio::test]
async fn test_third_reference_over_budget_triggers_one_preflush() {
    let size = operation_size(100).await;
    let store = IssueStore::with_issues(3, 100);
    let transport = Arc::new(RecordingTransport::default());
    let mut indexer = BulkIndexer::new(transport.clone(), registry(store))
        .with_bulk_limit_bytes(size * 2 + size / 2);

    for id in 1..=3 {
        assert_eq!(indexer.process(issue_ref(id)).await.unwrap(), size);
    }
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.request(0).operations, 2);

    assert!(indexer.flush().await.is_empty());
    assert_eq!(transport.calls(), 2);
    assert_eq!(transport.request(1).operations, 1);

    let ids: Vec<Value> = transport
        .headers()
        .iter()
        .map(|h| h["update"]["_id"].clone())
        .collect();
    assert_eq!(ids, vec![json!("issue_1"), json!("issue_2"), json!("issue_3")]);
}

#[tokio::test]
async fn test_no_flush_exceeds_budget_except_single_oversized_item() {
    let small = operation_size(10).await;
    let budget = small * 3;

    let store = Arc::new(IssueStore::default());
    let title_lens = [10, 10, 500, 10, 10, 10, 10, 700, 10];
    for (i, len) in title_lens.iter().enumerate() {
        store.insert(i as u64 + 1, *len);
    }

    let transport = Arc::new(RecordingTransport::default());
    let mut indexer =
        BulkIndexer::new(transport.clone(), registry(store)).with_bulk_limit_bytes(budget);

    // The first item never triggers a flush
    indexer.process(issue_ref(1)).await.unwrap();
    assert_eq!(transport.calls(), 0);

    for id in 2..=title_lens.len() as u64 {
        indexer.process(issue_ref(id)).await.unwrap();
    }
    indexer.flush().await;

    let requests: Vec<BulkRequest> = (0..transport.calls()).map(|n| transport.request(n)).collect();
    let sent: usize = requests.iter().map(|r| r.operations).sum();
    assert_eq!(sent, title_lens.len());

    for request in &requests {
        assert!(
            request.byte_size() <= budget || request.operations == 1,
            "flush of {} operations sent {} bytes over a {} byte budget",
            request.operations,
            request.byte_size(),
            budget
        );
    }
    assert!(requests.iter().any(|r| r.byte_size() > budget && r.operations == 1));
}

#[tokio::test]
async fn test_transport_failure_fails_exactly_the_buffered_references() {
    let size = operation_size(50).await;
    let store = IssueStore::with_issues(5, 50);
    let transport = RecordingTransport::failing();
    let mut indexer =
        BulkIndexer::new(transport.clone(), registry(store)).with_bulk_limit_bytes(size * 3);

    for id in 1..=5 {
        indexer.process(issue_ref(id)).await.unwrap();
    }
    // Items 1-3 were pre-flushed and failed; 4-5 are still buffered
    assert_eq!(indexer.failures(), &[issue_ref(1), issue_ref(2), issue_ref(3)]);

    let failed = indexer.flush().await;
    assert_eq!(failed, vec![issue_ref(4), issue_ref(5)]);
    assert_eq!(indexer.failures().len(), 5);
    assert_eq!(indexer.buffered_operations(), 0);
    assert_eq!(indexer.buffered_bytes(), 0);

    // Nothing left to send
    assert!(indexer.flush().await.is_empty());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_item_level_rejections_are_failures() {
    let store = IssueStore::with_issues(3, 10);
    let transport = RecordingTransport::rejecting(&["issue_2"]);
    let mut indexer = BulkIndexer::new(transport.clone(), registry(store));

    for id in 1..=3 {
        indexer.process(issue_ref(id)).await.unwrap();
    }

    assert_eq!(indexer.flush().await, vec![issue_ref(2)]);
    assert_eq!(indexer.failures(), &[issue_ref(2)]);
}

#[tokio::test]
async fn test_vanished_record_is_deleted_not_failed() {
    let store = IssueStore::with_issues(1, 10);
    let transport = Arc::new(RecordingTransport::default());
    let mut indexer = BulkIndexer::new(transport.clone(), registry(store.clone()));

    store.remove(1);
    let bytes = indexer.process(issue_ref(1)).await.unwrap();
    assert!(bytes > 0);

    assert!(indexer.flush().await.is_empty());
    assert!(indexer.failures().is_empty());

    let headers = transport.headers();
    assert_eq!(headers.len(), 1);
    assert_eq!(
        headers[0],
        json!({ "delete": { "_index": "issues", "_id": "issue_1", "routing": "project_1" } })
    );
    assert_eq!(transport.request(0).lines.len(), 1);
}

#[tokio::test]
async fn test_replay_targets_the_same_document() {
    let store = IssueStore::with_issues(1, 10);
    let transport = Arc::new(RecordingTransport::default());
    let mut indexer = BulkIndexer::new(transport.clone(), registry(store));

    indexer.process(issue_ref(1)).await.unwrap();
    indexer.process(issue_ref(1)).await.unwrap();
    indexer.flush().await;

    let headers = transport.headers();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0], headers[1]);
    assert_eq!(headers[0]["update"]["_id"], "issue_1");
    assert_eq!(headers[0]["update"]["routing"], "project_1");
}

#[tokio::test]
async fn test_executor_drains_queue_and_requeues_failures() {
    let store = IssueStore::with_issues(3, 10);
    let transport = RecordingTransport::rejecting(&["issue_3"]);
    let queue = Arc::new(InMemoryReferenceQueue::new());
    let executor =
        BookkeepingExecutor::new(queue.clone(), transport.clone(), registry(store.clone()));

    queue
        .track(vec![
            issue_ref(1).serialize(),
            "Issue|2|issue_2|project_1".to_string(),
            "not a reference at all".to_string(),
            issue_ref(3).serialize(),
        ])
        .await
        .unwrap();

    let summary = executor.execute(10).await.unwrap();
    assert_eq!(
        summary,
        ExecutionSummary {
            processed: 3,
            failures: 1
        }
    );

    // One batch lookup for the whole batch, one bulk call
    assert_eq!(store.find_many_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.calls(), 1);

    // The failed reference is back, the malformed one is gone
    assert_eq!(
        queue.queued_items().await.unwrap(),
        vec!["Issue 3 issue_3 project_1".to_string()]
    );
}

#[tokio::test]
async fn test_executor_on_empty_queue() {
    let store = IssueStore::with_issues(0, 10);
    let transport = Arc::new(RecordingTransport::default());
    let queue = Arc::new(InMemoryReferenceQueue::new());
    let executor = BookkeepingExecutor::new(queue, transport.clone(), registry(store));

    assert_eq!(executor.execute(10).await.unwrap(), ExecutionSummary::default());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_executor_discards_unregistered_types_and_makes_progress() {
    let store = IssueStore::with_issues(1, 10);
    let transport = Arc::new(RecordingTransport::default());
    let queue = Arc::new(InMemoryReferenceQueue::new());
    let executor = BookkeepingExecutor::new(queue.clone(), transport.clone(), registry(store));

    queue
        .track(vec!["Wiki 9 wiki_9".to_string(), "Issue 1 issue_1".to_string()])
        .await
        .unwrap();

    let summary = executor.execute(10).await.unwrap();
    assert_eq!(
        summary,
        ExecutionSummary {
            processed: 1,
            failures: 0
        }
    );
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.headers()[0]["update"]["_id"], "issue_1");
    assert_eq!(queue.queue_size().await.unwrap(), 0);

    assert_eq!(executor.execute(10).await.unwrap(), ExecutionSummary::default());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_executor_requeues_batch_on_error() {
    let store = IssueStore::with_issues(2, 10);
    let transport = Arc::new(RecordingTransport::default());
    let queue = Arc::new(InMemoryReferenceQueue::new());
    let executor =
        BookkeepingExecutor::new(queue.clone(), transport.clone(), registry(store.clone()));

    queue
        .track(vec![
            issue_ref(1).serialize(),
            "garbage".to_string(),
            issue_ref(2).serialize(),
        ])
        .await
        .unwrap();

    store.batch_lookups_fail.store(true, Ordering::SeqCst);
    let err = executor.execute(10).await.unwrap_err();
    assert!(matches!(err, IndexerError::Reference(ReferenceError::Lookup(_))));
    assert_eq!(transport.calls(), 0);

    // Every valid entry is back, the malformed one is gone
    let mut queued = queue.queued_items().await.unwrap();
    queued.sort();
    assert_eq!(queued, vec![issue_ref(1).serialize(), issue_ref(2).serialize()]);

    store.batch_lookups_fail.store(false, Ordering::SeqCst);
    let summary = executor.execute(10).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.failures, 0);
    assert_eq!(queue.queue_size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_executor_drains_only_requested_shards() {
    let store = IssueStore::with_issues(12, 10);
    let transport = Arc::new(RecordingTransport::default());
    let queue = Arc::new(InMemoryReferenceQueue::with_shards(4));
    let executor = BookkeepingExecutor::new(queue.clone(), transport.clone(), registry(store));

    let all: Vec<String> = (1..=12).map(|id| issue_ref(id).serialize()).collect();
    queue.track(all.clone()).await.unwrap();

    let shard = shard_number(&all[0], 4);
    let in_shard = queue.shard_items(shard).await.unwrap();

    let summary = executor.execute_shards(&[shard], 100).await.unwrap();
    assert_eq!(summary.processed, in_shard.len());
    assert!(queue.shard_items(shard).await.unwrap().is_empty());
    assert_eq!(queue.queue_size().await.unwrap(), all.len() - in_shard.len());
}
