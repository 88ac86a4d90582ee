//! OpenSearch bulk transport implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use opensearch::http::StatusCode;
use opensearch::BulkParts;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use crate::client::SearchClient;
use crate::errors::SearchIndexError;
use crate::interfaces::BulkTransport;
use crate::types::{BulkRequest, BulkResponseSummary};

/// Base delay between retries of a failed bulk call, doubled on each attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

/// Sends NDJSON bulk calls through a [`SearchClient`].
///
/// Transport-level failures (the engine could not be reached, or answered with a
/// retryable status) are retried up to the client's retry count. Per-item
/// failures inside an accepted call are never retried here; they are reported
/// back to the caller.
#[derive(Debug, Clone)]
pub struct OpenSearchBulkTransport {
    client: SearchClient,
    retry_base_delay: Duration,
}

impl OpenSearchBulkTransport {
    /// Create a transport sending through the given client.
    pub fn new(client: SearchClient) -> Self {
        Self {
            client,
            retry_base_delay: RETRY_BASE_DELAY,
        }
    }

    /// Override the base retry delay.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    async fn send_once(&self, request: &BulkRequest) -> Result<Value, SearchIndexError> {
        let response = self
            .client
            .inner()
            .bulk(BulkParts::None)
            .body(request.lines.clone())
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = format!("Bulk call failed with status {}: {}", status, error_body);
            return Err(if is_retryable_status(status) {
                SearchIndexError::transport(message)
            } else {
                SearchIndexError::bulk_index(message)
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
}

/// Run `send` until it succeeds, fails with a non-retryable error, or has been
/// retried `max_retries` times. The delay doubles after every retry.
async fn send_with_retries<F, Fut>(
    max_retries: u32,
    base_delay: Duration,
    mut send: F,
) -> Result<Value, SearchIndexError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, SearchIndexError>>,
{
    let mut attempt = 0;

    loop {
        match send().await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                attempt += 1;
                let delay = base_delay * 2u32.saturating_pow(attempt - 1);
                warn!(
                    error = %e,
                    attempt = attempt,
                    max_retries = max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Bulk call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                error!(error = %e, attempts = attempt + 1, "Bulk call failed");
                return Err(e);
            }
        }
    }
}

#[async_trait]
impl BulkTransport for OpenSearchBulkTransport {
    #[instrument(skip(self, request), fields(operations = request.operations))]
    async fn bulk(
        &self,
        request: &BulkRequest,
    ) -> Result<BulkResponseSummary, SearchIndexError> {
        if self.client.debug_enabled() {
            debug!(
                lines = request.lines.len(),
                bytes = request.byte_size(),
                "Sending bulk request"
            );
        }

        let max_retries = self.client.max_retries();
        let body = send_with_retries(max_retries, self.retry_base_delay, move || {
            self.send_once(request)
        })
        .await?;

        let summary = BulkResponseSummary::from_json(&body)?;

        if self.client.debug_enabled() {
            debug!(
                took_ms = summary.took,
                items = summary.items.len(),
                failed = summary.failed(),
                "Received bulk response"
            );
        }

        Ok(summary)
    }
}
