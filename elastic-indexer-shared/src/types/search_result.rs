//! Search result types.
//!
//! Raw hits are mapped back to the identities documents were indexed under, so a
//! hit can be turned into a [`DocumentReference`] and resolved against the system
//! of record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::errors::ReferenceError;
use crate::types::DocumentReference;

/// A single search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The document type of the hit.
    pub class_name: String,

    /// Primary key of the backing record.
    pub db_id: String,

    /// External document id.
    pub es_id: String,

    /// Routing key the document was indexed with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub es_parent: Option<String>,

    /// Relevance score from the search engine.
    pub score: f64,

    /// Highlighted fragments, keyed by field.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub highlight: HashMap<String, Vec<String>>,
}

impl SearchHit {
    /// The reference addressing the document behind this hit.
    pub fn reference(&self) -> Result<DocumentReference, ReferenceError> {
        DocumentReference::new(
            self.class_name.clone(),
            self.db_id.clone(),
            self.es_id.clone(),
            self.es_parent.clone(),
        )
    }
}

/// One bucket of a terms aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AggregationBucket {
    pub key: String,
    pub count: u64,
}

/// A named terms aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Aggregation {
    pub name: String,
    pub buckets: Vec<AggregationBucket>,
}

/// One page of search results with metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchPage {
    /// The hits on this page, ordered by relevance.
    pub hits: Vec<SearchHit>,

    /// Total number of matching documents.
    /// May be greater than the number of returned hits due to pagination.
    pub total: u64,

    /// Time taken to execute the search in milliseconds.
    pub took_ms: u64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregations: Vec<Aggregation>,
}

impl SearchPage {
    /// Create an empty page.
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            total: 0,
            took_ms: 0,
            aggregations: Vec::new(),
        }
    }

    /// Create a new page.
    pub fn new(hits: Vec<SearchHit>, total: u64, took_ms: u64) -> Self {
        Self {
            hits,
            total,
            took_ms,
            aggregations: Vec::new(),
        }
    }

    /// Attach aggregation results.
    pub fn with_aggregations(mut self, aggregations: Vec<Aggregation>) -> Self {
        self.aggregations = aggregations;
        self
    }

    /// Returns true if there are no hits.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns the number of hits on this page.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Look up an aggregation by name.
    pub fn aggregation(&self, name: &str) -> Option<&Aggregation> {
        self.aggregations.iter().find(|agg| agg.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: u64) -> SearchHit {
        SearchHit {
            class_name: "Issue".to_string(),
            db_id: id.to_string(),
            es_id: format!("issue_{}", id),
            es_parent: Some("project_1".to_string()),
            score: 1.5,
            highlight: HashMap::new(),
        }
    }

    #[test]
    fn test_search_page_empty() {
        let page = SearchPage::empty();
        assert!(page.is_empty());
        assert_eq!(page.len(), 0);
        assert_eq!(page.total, 0);
    }

    #[test]
    fn test_search_page_new() {
        let page = SearchPage::new(vec![hit(1)], 100, 5).with_aggregations(vec![Aggregation {
            name: "labels".to_string(),
            buckets: vec![AggregationBucket {
                key: "bug".to_string(),
                count: 4,
            }],
        }]);

        assert!(!page.is_empty());
        assert_eq!(page.len(), 1);
        assert_eq!(page.total, 100);
        assert_eq!(page.took_ms, 5);
        assert_eq!(page.aggregation("labels").unwrap().buckets[0].count, 4);
        assert!(page.aggregation("milestone").is_none());
    }

    #[test]
    fn test_hit_reference() {
        let reference = hit(7).reference().unwrap();
        assert_eq!(reference.serialize(), "Issue 7 issue_7 project_1");
    }

    #[test]
    fn test_serialization() {
        let page = SearchPage::new(vec![hit(2)], 1, 10);

        let json = serde_json::to_string(&page).unwrap();
        let deserialized: SearchPage = serde_json::from_str(&json).unwrap();

        assert_eq!(page, deserialized);
    }
}
