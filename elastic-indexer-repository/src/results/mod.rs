//! Query-side results adapter.
//!
//! Searches always read from a type's canonical alias, the same index name the
//! write pipeline deletes from and, outside an alias rollover, writes to. Raw
//! hits are mapped back to the identities documents were indexed under: the
//! external id, the routing key, and the `id` field of the indexed projection.

use std::collections::HashMap;
use std::sync::Arc;

use elastic_indexer_shared::{
    Aggregation, AggregationBucket, SearchHit, SearchPage, SearchQuery, TypeRegistry,
};
use opensearch::SearchParts;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument, warn};

use crate::client::SearchClient;
use crate::errors::SearchIndexError;

/// Counts at or above this are reported as a lower bound.
pub const COUNT_LIMIT: u64 = 10_000;

/// Runs searches for registered document types and shapes their results.
#[derive(Debug, Clone)]
pub struct SearchResultsAdapter {
    client: SearchClient,
    registry: Arc<TypeRegistry>,
}

impl SearchResultsAdapter {
    pub fn new(client: SearchClient, registry: Arc<TypeRegistry>) -> Self {
        Self { client, registry }
    }

    /// Run a search.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchPage)` - The page of hits, with aggregations when requested
    /// * `Err(SearchIndexError::ValidationError)` - Invalid query or unregistered type
    /// * `Err(SearchIndexError)` - If the engine call fails
    #[instrument(skip(self, query), fields(class_name = %query.class_name))]
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchPage, SearchIndexError> {
        query.validate().map_err(SearchIndexError::validation)?;

        let index = self
            .registry
            .canonical_index_name(&query.class_name)
            .map_err(|e| SearchIndexError::validation(e.to_string()))?;

        let body = Self::build_query_body(query);
        debug!(index = %index, body = %body, "Executing search");

        let indices = [index];
        let routing: Vec<&str> = query.routing.iter().map(String::as_str).collect();

        let mut request = self
            .client
            .inner()
            .search(SearchParts::Index(&indices))
            .body(body);
        if !routing.is_empty() {
            request = request.routing(&routing);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        let result: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        if !status.is_success() {
            let reason = result
                .get("error")
                .and_then(|e| e.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or("Search failed");
            return Err(SearchIndexError::search(format!(
                "Search on {} failed with status {}: {}",
                index, status, reason
            )));
        }

        Ok(Self::parse_response(query, &result))
    }

    /// Build the request body for a query.
    pub fn build_query_body(query: &SearchQuery) -> Value {
        let mut text_match = Map::new();
        text_match.insert("query".to_string(), json!(query.query));
        text_match.insert("default_operator".to_string(), json!("and"));
        if !query.fields.is_empty() {
            text_match.insert("fields".to_string(), json!(query.fields));
        }

        let filters: Vec<Value> = query
            .filters
            .iter()
            .map(|(field, value)| json!({ "term": { field: value } }))
            .collect();

        let mut body = Map::new();
        body.insert(
            "query".to_string(),
            json!({
                "bool": {
                    "must": [{ "simple_query_string": Value::Object(text_match) }],
                    "filter": filters
                }
            }),
        );
        body.insert("from".to_string(), json!(query.offset));
        body.insert("size".to_string(), json!(query.limit));

        if query.highlight {
            let mut fields = Map::new();
            if query.fields.is_empty() {
                fields.insert("*".to_string(), json!({}));
            } else {
                for field in &query.fields {
                    fields.insert(field.clone(), json!({}));
                }
            }
            body.insert(
                "highlight".to_string(),
                json!({
                    "fields": fields,
                    "pre_tags": ["<em>"],
                    "post_tags": ["</em>"]
                }),
            );
        }

        if !query.aggregations.is_empty() {
            let aggs: Map<String, Value> = query
                .aggregations
                .iter()
                .map(|field| (field.clone(), json!({ "terms": { "field": field } })))
                .collect();
            body.insert("aggs".to_string(), Value::Object(aggs));
        }

        Value::Object(body)
    }

    /// Map a raw search response to a page of hits.
    ///
    /// Hits whose projection carries no `id` cannot be mapped back to a record
    /// and are skipped.
    pub fn parse_response(query: &SearchQuery, result: &Value) -> SearchPage {
        let hits = result["hits"]["hits"]
            .as_array()
            .map(|hits| {
                hits.iter()
                    .filter_map(|hit| Self::parse_hit(&query.class_name, hit))
                    .collect()
            })
            .unwrap_or_default();

        let aggregations = query
            .aggregations
            .iter()
            .filter_map(|name| {
                let buckets = result["aggregations"][name.as_str()]["buckets"].as_array()?;
                Some(Aggregation {
                    name: name.clone(),
                    buckets: buckets.iter().filter_map(parse_bucket).collect(),
                })
            })
            .collect();

        let total = match &result["hits"]["total"] {
            Value::Object(total) => total.get("value").and_then(Value::as_u64).unwrap_or(0),
            other => other.as_u64().unwrap_or(0),
        };

        SearchPage::new(hits, total, result["took"].as_u64().unwrap_or(0))
            .with_aggregations(aggregations)
    }

    fn parse_hit(class_name: &str, hit: &Value) -> Option<SearchHit> {
        let es_id = hit["_id"].as_str()?.to_string();

        let db_id = match &hit["_source"]["id"] {
            Value::String(id) => id.clone(),
            Value::Number(id) => id.to_string(),
            _ => {
                warn!(es_id = %es_id, "Search hit has no record id, skipping");
                return None;
            }
        };

        let highlight: HashMap<String, Vec<String>> = hit["highlight"]
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(field, fragments)| {
                        let fragments = fragments
                            .as_array()
                            .map(|a| {
                                a.iter()
                                    .filter_map(|s| s.as_str().map(str::to_string))
                                    .collect()
                            })
                            .unwrap_or_default();
                        (field.clone(), fragments)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Some(SearchHit {
            class_name: class_name.to_string(),
            db_id,
            es_id,
            es_parent: hit["_routing"].as_str().map(str::to_string),
            score: hit["_score"].as_f64().unwrap_or(0.0),
            highlight,
        })
    }

    /// Format a hit count for display.
    ///
    /// # Example
    ///
    /// ```
    /// use elastic_indexer_repository::SearchResultsAdapter;
    ///
    /// assert_eq!(SearchResultsAdapter::formatted_count(Some(1234)), "1,234");
    /// assert_eq!(SearchResultsAdapter::formatted_count(Some(25_000)), "10,000+");
    /// assert_eq!(SearchResultsAdapter::formatted_count(None), "0");
    /// ```
    pub fn formatted_count(count: Option<u64>) -> String {
        match count {
            None => "0".to_string(),
            Some(count) if count >= COUNT_LIMIT => format!("{}+", with_delimiter(COUNT_LIMIT)),
            Some(count) => with_delimiter(count),
        }
    }
}

fn parse_bucket(bucket: &Value) -> Option<AggregationBucket> {
    let key = match &bucket["key"] {
        Value::String(key) => key.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    Some(AggregationBucket {
        key,
        count: bucket["doc_count"].as_u64().unwrap_or(0),
    })
}

fn with_delimiter(count: u64) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}
