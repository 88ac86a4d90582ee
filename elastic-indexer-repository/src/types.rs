//! Request and response types for bulk writes.

use serde_json::Value;

use crate::errors::SearchIndexError;

/// One bulk write call: NDJSON lines, each metadata line optionally followed by
/// its document line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkRequest {
    /// The lines of the request body, without trailing newlines.
    pub lines: Vec<String>,
    /// Number of operations the lines encode.
    pub operations: usize,
}

impl BulkRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one operation: its metadata line and, for writes with a body, the
    /// document line.
    pub fn push(&mut self, header: String, document: Option<String>) {
        self.lines.push(header);
        if let Some(document) = document {
            self.lines.push(document);
        }
        self.operations += 1;
    }

    /// Returns true if the request holds no operations.
    pub fn is_empty(&self) -> bool {
        self.operations == 0
    }

    /// Size of the request body in bytes, one newline per line included.
    pub fn byte_size(&self) -> usize {
        self.lines.iter().map(|line| line.len() + 1).sum()
    }
}

/// Result of a bulk call for a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemOutcome {
    /// Action key of the item (`index`, `update` or `delete`).
    pub action: String,
    pub index: Option<String>,
    pub id: Option<String>,
    /// HTTP status the engine reported for the item.
    pub status: u16,
    /// Error reason, if the item failed.
    pub error: Option<String>,
}

impl BulkItemOutcome {
    /// Whether the operation reached its intended state.
    ///
    /// A delete answered with 404 already is in its intended state.
    pub fn is_success(&self) -> bool {
        if (200..300).contains(&self.status) {
            return true;
        }
        self.action == "delete" && self.status == 404
    }

    fn from_item(item: &Value) -> Result<Self, SearchIndexError> {
        let (action, body) = item
            .as_object()
            .and_then(|object| object.iter().next())
            .ok_or_else(|| SearchIndexError::parse(format!("Malformed bulk item: {}", item)))?;

        let status = body
            .get("status")
            .and_then(Value::as_u64)
            .ok_or_else(|| SearchIndexError::parse(format!("Bulk item without status: {}", item)))?;

        let error = body.get("error").map(|error| {
            error
                .get("reason")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        });

        Ok(Self {
            action: action.clone(),
            index: body.get("_index").and_then(Value::as_str).map(str::to_string),
            id: body.get("_id").and_then(Value::as_str).map(str::to_string),
            status: u16::try_from(status).unwrap_or(u16::MAX),
            error,
        })
    }
}

/// Parsed bulk response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponseSummary {
    /// Time the engine spent on the call, in milliseconds.
    pub took: u64,
    /// Whether the engine reported any item-level error.
    pub errors: bool,
    /// Outcomes in request order.
    pub items: Vec<BulkItemOutcome>,
}

impl BulkResponseSummary {
    /// Parse a bulk response body.
    pub fn from_json(body: &Value) -> Result<Self, SearchIndexError> {
        let items = match body.get("items") {
            Some(Value::Array(items)) => items
                .iter()
                .map(BulkItemOutcome::from_item)
                .collect::<Result<Vec<_>, _>>()?,
            Some(other) => {
                return Err(SearchIndexError::parse(format!(
                    "Bulk response items is not an array: {}",
                    other
                )))
            }
            None => Vec::new(),
        };

        Ok(Self {
            took: body.get("took").and_then(Value::as_u64).unwrap_or(0),
            errors: body.get("errors").and_then(Value::as_bool).unwrap_or(false),
            items,
        })
    }

    /// Positions, in request order, of the operations that failed.
    pub fn failed_positions(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_success())
            .map(|(position, _)| position)
            .collect()
    }

    /// Number of operations that failed.
    pub fn failed(&self) -> usize {
        self.items.iter().filter(|item| !item.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bulk_request_size() {
        let mut request = BulkRequest::new();
        assert!(request.is_empty());

        request.push(r#"{"delete":{"_index":"issues","_id":"issue_1"}}"#.to_string(), None);
        request.push(
            r#"{"index":{"_index":"issues","_id":"issue_2"}}"#.to_string(),
            Some(r#"{"id":2}"#.to_string()),
        );

        assert_eq!(request.operations, 2);
        assert_eq!(request.lines.len(), 3);
        let expected: usize = request.lines.iter().map(|l| l.len()).sum::<usize>() + 3;
        assert_eq!(request.byte_size(), expected);
    }

    #[test]
    fn test_parse_bulk_response() {
        let body = json!({
            "took": 12,
            "errors": true,
            "items": [
                { "index": { "_index": "issues_v2", "_id": "issue_1", "status": 201 } },
                { "update": { "_index": "issues_v2", "_id": "issue_2", "status": 400,
                    "error": {
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse field [weight]"
                    } } },
                { "delete": { "_index": "issues", "_id": "issue_3", "status": 404 } },
                { "index": { "_index": "issues_v2", "_id": "issue_4", "status": 429,
                    "error": { "type": "es_rejected_execution_exception" } } }
            ]
        });

        let summary = BulkResponseSummary::from_json(&body).unwrap();
        assert_eq!(summary.took, 12);
        assert!(summary.errors);
        assert_eq!(summary.items.len(), 4);
        assert_eq!(summary.failed_positions(), vec![1, 3]);
        assert_eq!(summary.failed(), 2);
        assert_eq!(
            summary.items[1].error.as_deref(),
            Some("failed to parse field [weight]")
        );
        assert!(summary.items[3]
            .error
            .as_deref()
            .unwrap()
            .contains("es_rejected_execution_exception"));
    }

    #[test]
    fn test_missing_delete_is_success_but_missing_update_is_not() {
        let delete = BulkItemOutcome {
            action: "delete".to_string(),
            index: None,
            id: None,
            status: 404,
            error: None,
        };
        let update = BulkItemOutcome {
            action: "update".to_string(),
            ..delete.clone()
        };
        assert!(delete.is_success());
        assert!(!update.is_success());
    }

    #[test]
    fn test_malformed_response() {
        assert!(BulkResponseSummary::from_json(&json!({ "items": {} })).is_err());
        assert!(BulkResponseSummary::from_json(&json!({ "items": [ { "index": {} } ] })).is_err());
        assert_eq!(
            BulkResponseSummary::from_json(&json!({ "took": 1 })).unwrap().items.len(),
            0
        );
    }
}
