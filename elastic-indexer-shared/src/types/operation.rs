//! Write operations a document reference can resolve to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ReferenceError;

/// The write a reference resolves to against the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Replace the whole document with a freshly computed projection.
    Index,
    /// Merge the projection into the existing document, creating it if absent.
    Upsert,
    /// Remove the document.
    Delete,
}

impl Operation {
    /// The operation's name, as used in logs and serialized payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
        }
    }

    /// The action key of the bulk metadata line for this operation.
    pub fn bulk_action(&self) -> &'static str {
        match self {
            Operation::Index => "index",
            Operation::Upsert => "update",
            Operation::Delete => "delete",
        }
    }

    /// Returns true if the operation sends a document body line.
    pub fn has_body(&self) -> bool {
        !matches!(self, Operation::Delete)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "index" => Ok(Operation::Index),
            "upsert" => Ok(Operation::Upsert),
            "delete" => Ok(Operation::Delete),
            other => Err(ReferenceError::unsupported_operation(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_operations() {
        assert_eq!("index".parse::<Operation>().unwrap(), Operation::Index);
        assert_eq!("upsert".parse::<Operation>().unwrap(), Operation::Upsert);
        assert_eq!("delete".parse::<Operation>().unwrap(), Operation::Delete);
    }

    #[test]
    fn test_parse_unknown_operation_is_an_error() {
        let result = "reindex".parse::<Operation>();
        assert!(matches!(
            result.unwrap_err(),
            ReferenceError::UnsupportedOperation(ref value) if value == "reindex"
        ));
    }

    #[test]
    fn test_bulk_actions() {
        assert_eq!(Operation::Index.bulk_action(), "index");
        assert_eq!(Operation::Upsert.bulk_action(), "update");
        assert_eq!(Operation::Delete.bulk_action(), "delete");
        assert!(!Operation::Delete.has_body());
        assert!(Operation::Upsert.has_body());
    }
}
