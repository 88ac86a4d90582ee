//! Document references.
//!
//! A [`DocumentReference`] addresses "this record should exist (or not) in the
//! index" independently of the record's type. References are built from live
//! records or parsed back from the strings job queues store, and are the unit
//! the bulk indexer consumes.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::ReferenceError;
use crate::interfaces::Indexable;
use crate::registry::TypeRegistry;
use crate::types::Operation;

/// Delimiter of the canonical serialized form.
pub const DELIMITER: &str = " ";

/// Delimiter accepted for payloads serialized by older producers.
pub const LEGACY_DELIMITER: &str = "|";

/// Immutable address of one record's presence in the search index.
///
/// Equality and hashing consider only `class_name`, `db_id`, `es_id` and
/// `es_parent`; a resolved database record never takes part.
#[derive(Clone)]
pub struct DocumentReference {
    class_name: String,
    db_id: String,
    es_id: String,
    es_parent: Option<String>,
    database_record: OnceLock<Option<Arc<dyn Indexable>>>,
}

impl DocumentReference {
    /// Create a reference from its fields.
    ///
    /// An empty `es_parent` is treated as "no routing".
    ///
    /// # Returns
    ///
    /// * `Ok(DocumentReference)` - The reference
    /// * `Err(ReferenceError::Invalid)` - If a field is empty or contains a delimiter
    pub fn new(
        class_name: impl Into<String>,
        db_id: impl Into<String>,
        es_id: impl Into<String>,
        es_parent: Option<String>,
    ) -> Result<Self, ReferenceError> {
        let class_name = class_name.into();
        let db_id = db_id.into();
        let es_id = es_id.into();
        let es_parent = es_parent.filter(|parent| !parent.is_empty());

        validate_field("class_name", &class_name)?;
        validate_field("db_id", &db_id)?;
        validate_field("es_id", &es_id)?;
        if let Some(ref parent) = es_parent {
            validate_field("es_parent", parent)?;
        }

        Ok(Self {
            class_name,
            db_id,
            es_id,
            es_parent,
            database_record: OnceLock::new(),
        })
    }

    /// Build a reference from a live record, reading only the record's own accessors.
    ///
    /// The record is kept as the reference's resolved database record.
    pub fn build(record: Arc<dyn Indexable>) -> Result<Self, ReferenceError> {
        let reference = Self::new(
            record.class_name(),
            record.db_id(),
            record.es_id(),
            record.es_parent(),
        )?;
        let _ = reference.database_record.set(Some(record));
        Ok(reference)
    }

    /// Parse a serialized reference.
    ///
    /// Both the canonical space-delimited form and the legacy pipe-delimited form
    /// are accepted.
    ///
    /// # Example
    ///
    /// ```
    /// use elastic_indexer_shared::DocumentReference;
    ///
    /// let canonical = DocumentReference::deserialize("Issue 7 issue_7 5").unwrap();
    /// let legacy = DocumentReference::deserialize("Issue|7|issue_7|5").unwrap();
    /// assert_eq!(canonical, legacy);
    /// ```
    pub fn deserialize(serialized: &str) -> Result<Self, ReferenceError> {
        let delimiter = if serialized.contains(DELIMITER) {
            DELIMITER
        } else {
            LEGACY_DELIMITER
        };
        let fields: Vec<&str> = serialized.split(delimiter).collect();
        Self::deserialize_array(&fields)
    }

    /// Build a reference from its already split fields, in serialization order.
    ///
    /// # Returns
    ///
    /// * `Err(ReferenceError::Invalid)` - Unless there are exactly 3 or 4 valid fields
    pub fn deserialize_array(fields: &[&str]) -> Result<Self, ReferenceError> {
        match fields {
            [class_name, db_id, es_id] => Self::new(*class_name, *db_id, *es_id, None),
            [class_name, db_id, es_id, es_parent] => {
                Self::new(*class_name, *db_id, *es_id, Some(es_parent.to_string()))
            }
            _ => Err(ReferenceError::invalid(format!(
                "expected 3 or 4 fields, got {}",
                fields.len()
            ))),
        }
    }

    /// Serialize to the canonical delimiter-joined form.
    pub fn serialize(&self) -> String {
        let mut fields = vec![
            self.class_name.as_str(),
            self.db_id.as_str(),
            self.es_id.as_str(),
        ];
        if let Some(ref parent) = self.es_parent {
            fields.push(parent);
        }
        fields.join(DELIMITER)
    }

    /// Resolve many references' database records with one lookup per document type.
    ///
    /// Resolved records are attached to each reference so later
    /// [`database_record`](Self::database_record) calls do not query again.
    /// References whose record is missing from the batch resolve to `None`.
    pub async fn preload(
        references: &[DocumentReference],
        registry: &TypeRegistry,
    ) -> Result<(), ReferenceError> {
        let mut groups: HashMap<&str, Vec<&DocumentReference>> = HashMap::new();
        for reference in references
            .iter()
            .filter(|reference| reference.database_record.get().is_none())
        {
            groups
                .entry(reference.class_name.as_str())
                .or_default()
                .push(reference);
        }

        for (class_name, group) in groups {
            let handler = registry.handler(class_name)?;

            let mut db_ids: Vec<String> = group.iter().map(|r| r.db_id.clone()).collect();
            db_ids.sort();
            db_ids.dedup();

            let records = handler.source().find_many(&db_ids).await?;
            let by_id: HashMap<String, Arc<dyn Indexable>> = records
                .into_iter()
                .map(|record| (record.db_id(), record))
                .collect();

            for reference in group {
                let _ = reference
                    .database_record
                    .set(by_id.get(&reference.db_id).cloned());
            }
        }

        Ok(())
    }

    /// The record this reference points at, looked up once and memoized.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - The live record
    /// * `Ok(None)` - The record no longer exists
    /// * `Err(ReferenceError)` - The type is unregistered or the lookup raised
    pub async fn database_record(
        &self,
        registry: &TypeRegistry,
    ) -> Result<Option<Arc<dyn Indexable>>, ReferenceError> {
        if let Some(record) = self.database_record.get() {
            return Ok(record.clone());
        }

        let handler = registry.handler(&self.class_name)?;
        let record = handler.source().find(&self.db_id).await?;
        Ok(self.database_record.get_or_init(|| record).clone())
    }

    /// The record as storage holds it now.
    ///
    /// A memoized record is returned as is. A memoized miss is not trusted: the
    /// record may have been created since it was looked up, so storage is read
    /// again.
    pub async fn current_record(
        &self,
        registry: &TypeRegistry,
    ) -> Result<Option<Arc<dyn Indexable>>, ReferenceError> {
        if let Some(record) = self.database_record(registry).await? {
            return Ok(Some(record));
        }

        let handler = registry.handler(&self.class_name)?;
        Ok(handler.source().find(&self.db_id).await?)
    }

    /// Resolve the write this reference needs.
    ///
    /// Storage is re-read on every call: a record that can no longer be found
    /// resolves to [`Operation::Delete`], a live one to its type's write mode.
    pub async fn operation(&self, registry: &TypeRegistry) -> Result<Operation, ReferenceError> {
        let handler = registry.handler(&self.class_name)?;
        if handler.source().exists(&self.db_id).await? {
            Ok(handler.write_mode().operation())
        } else {
            Ok(Operation::Delete)
        }
    }

    /// The index this reference is written to, resolving its operation first.
    pub async fn index_name(&self, registry: &TypeRegistry) -> Result<String, ReferenceError> {
        let operation = self.operation(registry).await?;
        self.index_name_for(operation, registry)
    }

    /// The index an already resolved operation is written to.
    ///
    /// Deletes address the canonical alias since there is no live record to route
    /// by; other writes address the type's live write index.
    pub fn index_name_for(
        &self,
        operation: Operation,
        registry: &TypeRegistry,
    ) -> Result<String, ReferenceError> {
        let index = registry.handler(&self.class_name)?.index();
        let name = match operation {
            Operation::Delete => index.alias(),
            Operation::Index | Operation::Upsert => index.write_index(),
        };
        Ok(name.to_string())
    }

    /// Always `None`: every document type has its own index.
    pub fn document_type(&self) -> Option<&str> {
        None
    }

    /// The document type identifier.
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Primary key in the system of record.
    pub fn db_id(&self) -> &str {
        &self.db_id
    }

    /// External document id.
    pub fn es_id(&self) -> &str {
        &self.es_id
    }

    /// Routing key, `None` for top-level documents.
    pub fn es_parent(&self) -> Option<&str> {
        self.es_parent.as_deref()
    }
}

fn validate_field(name: &str, value: &str) -> Result<(), ReferenceError> {
    if value.is_empty() {
        return Err(ReferenceError::invalid(format!("{} cannot be empty", name)));
    }
    if value.contains(DELIMITER) || value.contains(LEGACY_DELIMITER) || value.contains('\n') {
        return Err(ReferenceError::invalid(format!(
            "{} '{}' contains a delimiter",
            name, value
        )));
    }
    Ok(())
}

impl PartialEq for DocumentReference {
    fn eq(&self, other: &Self) -> bool {
        self.class_name == other.class_name
            && self.db_id == other.db_id
            && self.es_id == other.es_id
            && self.es_parent == other.es_parent
    }
}

impl Eq for DocumentReference {}

impl Hash for DocumentReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_name.hash(state);
        self.db_id.hash(state);
        self.es_id.hash(state);
        self.es_parent.hash(state);
    }
}

impl fmt::Debug for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentReference")
            .field("class_name", &self.class_name)
            .field("db_id", &self.db_id)
            .field("es_id", &self.es_id)
            .field("es_parent", &self.es_parent)
            .field("record_loaded", &self.database_record.get().is_some())
            .finish()
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl FromStr for DocumentReference {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::deserialize(s)
    }
}

impl Serialize for DocumentReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&DocumentReference::serialize(self))
    }
}

impl<'de> Deserialize<'de> for DocumentReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let serialized = String::deserialize(deserializer)?;
        DocumentReference::deserialize(&serialized).map_err(serde::de::Error::custom)
    }
}
