//! Core data types for the document store
//!
//! - `Document`: a schema-less record addressed by a path
//! - `ChangeEvent`: a notification emitted for every mutation
//! - `StoreStats`: collection and document counts

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field map stored in a document
pub type Fields = Map<String, Value>;

/// A single stored document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Last path segment
    pub id: String,
    /// Full document path
    pub path: String,
    /// Document fields
    pub data: Fields,
    /// Creation time in milliseconds since epoch
    pub create_time: i64,
    /// Last write time in milliseconds since epoch
    pub update_time: i64,
}

impl Document {
    pub(crate) fn new(id: impl Into<String>, path: impl Into<String>, data: Fields) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: id.into(),
            path: path.into(),
            data,
            create_time: now,
            update_time: now,
        }
    }

    /// Look up a field. Dotted names address nested maps (`address.city`).
    pub fn field(&self, name: &str) -> Option<&Value> {
        let mut parts = name.split('.');
        let first = parts.next()?;
        let mut current = self.data.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// The document data with its id inlined, the shape list views consume
    pub fn to_json(&self) -> Value {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.clone()));
        Value::Object(data)
    }
}

/// Kind of mutation that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Removed => write!(f, "removed"),
        }
    }
}

/// Emitted on the store's change channel after each mutation
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Path of the document that changed
    pub path: String,
    /// Path of the collection containing it
    pub collection: String,
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreStats {
    pub collection_count: usize,
    pub document_count: usize,
    pub dirty: bool,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} documents in {} collections{}",
            self.document_count,
            self.collection_count,
            if self.dirty { " (unflushed)" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(data: Value) -> Document {
        let Value::Object(map) = data else {
            panic!("expected object");
        };
        Document::new("c1", "restaurants/r1/customers/c1", map)
    }

    #[test]
    fn test_nested_field_lookup() {
        let d = doc(json!({"name": "Ana", "address": {"city": "Lyon"}}));
        assert_eq!(d.field("name"), Some(&json!("Ana")));
        assert_eq!(d.field("address.city"), Some(&json!("Lyon")));
        assert_eq!(d.field("address.zip"), None);
        assert_eq!(d.field("name.first"), None);
    }

    #[test]
    fn test_to_json_inlines_id() {
        let d = doc(json!({"name": "Ana"}));
        assert_eq!(d.to_json(), json!({"id": "c1", "name": "Ana"}));
    }
}
