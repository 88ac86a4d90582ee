//! Search query types.
//!
//! A [`SearchQuery`] is scoped to one document type. The index it is run against
//! is the type's canonical alias, the same name deletes are written to.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of hits a single page may hold.
pub const MAX_LIMIT: usize = 100;

/// Search query parameters for one document type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchQuery {
    /// The document type searched.
    pub class_name: String,

    /// The free-text query string.
    pub query: String,

    /// Fields the text query is matched against. Empty means all fields.
    #[serde(default)]
    pub fields: Vec<String>,

    /// Exact-match term filters, keyed by field.
    #[serde(default)]
    pub filters: BTreeMap<String, Value>,

    /// Routing key restricting the search to the shard of one parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,

    /// Fields to compute terms aggregations for.
    #[serde(default)]
    pub aggregations: Vec<String>,

    /// Whether matched fragments are highlighted.
    #[serde(default)]
    pub highlight: bool,

    /// Maximum number of results to return.
    /// Default is 20, maximum is 100.
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Offset for pagination.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

impl SearchQuery {
    /// Create a query over one document type.
    ///
    /// # Example
    ///
    /// ```
    /// use elastic_indexer_shared::SearchQuery;
    ///
    /// let query = SearchQuery::new("Issue", "login timeout")
    ///     .with_fields(["title", "description"])
    ///     .with_routing("project_12");
    /// assert_eq!(query.limit, 20);
    /// ```
    pub fn new(class_name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            query: query.into(),
            fields: Vec::new(),
            filters: BTreeMap::new(),
            routing: None,
            aggregations: Vec::new(),
            highlight: false,
            limit: default_limit(),
            offset: 0,
        }
    }

    /// Restrict the text match to the given fields.
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Add an exact-match filter.
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    /// Search only the shard of the given routing key.
    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    /// Request a terms aggregation over a field.
    pub fn with_aggregation(mut self, field: impl Into<String>) -> Self {
        self.aggregations.push(field.into());
        self
    }

    /// Request highlighted fragments for the matched fields.
    pub fn with_highlight(mut self) -> Self {
        self.highlight = true;
        self
    }

    /// Set the limit for results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    /// Set the offset for pagination.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Validate the query parameters.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.class_name.trim().is_empty() {
            return Err("class_name cannot be empty".to_string());
        }

        if self.query.trim().is_empty() {
            return Err("Query string cannot be empty".to_string());
        }

        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(format!("limit must be between 1 and {}", MAX_LIMIT));
        }

        Ok(())
    }
}
