//! Explicit registry of indexable document types.
//!
//! Every document type taking part in indexing is registered once at startup
//! under its class name. The handler tells the pipeline how the type is written
//! (full index or partial upsert), where it lives (index alias and live write
//! target), which projection field carries its routing key, and where its
//! records are read from.

use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::ReferenceError;
use crate::interfaces::RecordSource;
use crate::types::Operation;

/// Get the versioned physical index name behind an alias.
///
/// # Example
///
/// ```
/// use elastic_indexer_shared::versioned_index_name;
///
/// assert_eq!(versioned_index_name("issues", 2), "issues_v2");
/// ```
pub fn versioned_index_name(alias: &str, version: u32) -> String {
    format!("{}_v{}", alias, version)
}

/// How live records of a type are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// The projection is always computed in full and replaces the document.
    #[default]
    Index,
    /// The projection is merged into the stored document.
    Upsert,
}

impl WriteMode {
    /// The operation a live record of this type resolves to.
    pub fn operation(&self) -> Operation {
        match self {
            WriteMode::Index => Operation::Index,
            WriteMode::Upsert => Operation::Upsert,
        }
    }
}

/// Index names used by a document type.
///
/// Reads and deletes always address the stable alias. Live writes address the
/// write index, which differs from the alias while an alias rollover is in
/// progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    alias: String,
    write_index: Option<String>,
}

impl IndexTarget {
    /// Target an alias, writing through the alias itself.
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            write_index: None,
        }
    }

    /// Target an alias whose live writes go to the given versioned index.
    pub fn versioned(alias: impl Into<String>, version: u32) -> Self {
        let alias = alias.into();
        let write_index = versioned_index_name(&alias, version);
        Self {
            alias,
            write_index: Some(write_index),
        }
    }

    /// Send live writes to an explicit index name.
    pub fn with_write_index(mut self, index: impl Into<String>) -> Self {
        self.write_index = Some(index.into());
        self
    }

    /// The canonical, stable index name.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The index name live writes are routed to.
    pub fn write_index(&self) -> &str {
        self.write_index.as_deref().unwrap_or(&self.alias)
    }
}

/// Everything the pipeline needs to know about one document type.
#[derive(Clone)]
pub struct TypeHandler {
    index: IndexTarget,
    write_mode: WriteMode,
    routing_field: Option<String>,
    source: Arc<dyn RecordSource>,
}

impl TypeHandler {
    /// Create a handler that fully indexes records and expects no routing.
    pub fn new(index: IndexTarget, source: Arc<dyn RecordSource>) -> Self {
        Self {
            index,
            write_mode: WriteMode::Index,
            routing_field: None,
            source,
        }
    }

    /// Set how live records are written.
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }

    /// Require the projection to carry its routing key in the given field.
    pub fn with_routing_field(mut self, field: impl Into<String>) -> Self {
        self.routing_field = Some(field.into());
        self
    }

    /// The index names of the type.
    pub fn index(&self) -> &IndexTarget {
        &self.index
    }

    /// How live records are written.
    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// The projection field that must hold the routing key, if the type is routed.
    pub fn routing_field(&self) -> Option<&str> {
        self.routing_field.as_deref()
    }

    /// The source records of this type are read from.
    pub fn source(&self) -> &Arc<dyn RecordSource> {
        &self.source
    }
}

impl std::fmt::Debug for TypeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeHandler")
            .field("index", &self.index)
            .field("write_mode", &self.write_mode)
            .field("routing_field", &self.routing_field)
            .finish_non_exhaustive()
    }
}

/// Maps class names to their [`TypeHandler`].
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    handlers: HashMap<String, TypeHandler>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document type, replacing any previous handler for the class name.
    pub fn register(mut self, class_name: impl Into<String>, handler: TypeHandler) -> Self {
        self.handlers.insert(class_name.into(), handler);
        self
    }

    /// Look up the handler of a document type.
    ///
    /// # Returns
    ///
    /// * `Ok(&TypeHandler)` - The registered handler
    /// * `Err(ReferenceError::UnknownClass)` - If the class name was never registered
    pub fn handler(&self, class_name: &str) -> Result<&TypeHandler, ReferenceError> {
        self.handlers
            .get(class_name)
            .ok_or_else(|| ReferenceError::unknown_class(class_name))
    }

    /// The canonical index name reads for a document type go to.
    pub fn canonical_index_name(&self, class_name: &str) -> Result<&str, ReferenceError> {
        Ok(self.handler(class_name)?.index().alias())
    }

    /// Returns true if the class name has a handler.
    pub fn contains(&self, class_name: &str) -> bool {
        self.handlers.contains_key(class_name)
    }

    /// Iterate over the registered class names.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RecordLookupError;
    use crate::interfaces::Indexable;
    use async_trait::async_trait;

    struct EmptySource;

    #[async_trait]
    impl RecordSource for EmptySource {
        async fn find(
            &self,
            _db_id: &str,
        ) -> Result<Option<Arc<dyn Indexable>>, RecordLookupError> {
            Ok(None)
        }

        async fn find_many(
            &self,
            _db_ids: &[String],
        ) -> Result<Vec<Arc<dyn Indexable>>, RecordLookupError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_versioned_index_name() {
        assert_eq!(versioned_index_name("issues", 0), "issues_v0");
        assert_eq!(versioned_index_name("issues", 42), "issues_v42");
    }

    #[test]
    fn test_index_target_names() {
        let plain = IndexTarget::new("issues");
        assert_eq!(plain.alias(), "issues");
        assert_eq!(plain.write_index(), "issues");

        let rolling = IndexTarget::versioned("issues", 3);
        assert_eq!(rolling.alias(), "issues");
        assert_eq!(rolling.write_index(), "issues_v3");

        let explicit = IndexTarget::new("notes").with_write_index("notes-20240101-0000");
        assert_eq!(explicit.write_index(), "notes-20240101-0000");
    }

    #[test]
    fn test_registry_lookup() {
        let registry = TypeRegistry::new().register(
            "Issue",
            TypeHandler::new(IndexTarget::new("issues"), Arc::new(EmptySource))
                .with_write_mode(WriteMode::Upsert)
                .with_routing_field("project_id"),
        );

        let handler = registry.handler("Issue").unwrap();
        assert_eq!(handler.write_mode().operation(), Operation::Upsert);
        assert_eq!(handler.routing_field(), Some("project_id"));
        assert_eq!(registry.canonical_index_name("Issue").unwrap(), "issues");
        assert!(registry.contains("Issue"));
    }

    #[test]
    fn test_registry_unknown_class() {
        let registry = TypeRegistry::new();
        assert!(matches!(
            registry.handler("Wiki").unwrap_err(),
            ReferenceError::UnknownClass(ref name) if name == "Wiki"
        ));
    }
}
