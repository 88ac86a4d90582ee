//! Utility functions shared by the indexing pipeline.

/// Build a composite external document id from a document type and target id.
///
/// # Example
///
/// ```
/// use elastic_indexer_shared::build_es_id;
///
/// assert_eq!(build_es_id("issue", "7"), "issue_7");
/// ```
pub fn build_es_id(es_type: &str, target_id: impl std::fmt::Display) -> String {
    format!("{}_{}", es_type, target_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_es_id() {
        assert_eq!(build_es_id("issue", 7), "issue_7");
        assert_eq!(build_es_id("note", "42"), "note_42");
    }
}
