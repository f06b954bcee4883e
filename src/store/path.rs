//! Slash-separated document paths
//!
//! A path alternates collection and document ids:
//!
//! ```text
//! restaurants                       collection (1 segment)
//! restaurants/r1                    document   (2 segments)
//! restaurants/r1/orders             collection (3 segments)
//! restaurants/r1/orders/o1          document   (4 segments)
//! restaurants/r1/orders/o1/items    collection (5 segments)
//! ```
//!
//! Odd segment counts address collections, even counts address documents.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{StoreError, StoreResult};

/// A parsed, validated document or collection path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    segments: Vec<String>,
}

impl DocPath {
    /// Parse a raw path string. Leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> StoreResult<Self> {
        let trimmed = raw.trim().trim_matches('/');
        if trimmed.is_empty() {
            return Err(StoreError::invalid_path(raw, "path is empty"));
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.trim().is_empty() {
                return Err(StoreError::invalid_path(raw, "empty segment"));
            }
            if segment == "." || segment == ".." {
                return Err(StoreError::invalid_path(raw, "relative segment"));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    /// Root collection path with a single segment
    pub fn collection(name: &str) -> StoreResult<Self> {
        Self::parse(name).and_then(|p| p.expect_collection())
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the path addresses a document (even segment count)
    pub fn is_document(&self) -> bool {
        self.segments.len() % 2 == 0
    }

    /// True when the path addresses a collection (odd segment count)
    pub fn is_collection(&self) -> bool {
        !self.is_document()
    }

    /// Last segment: the document id or the collection name
    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Parent path, `None` for a root collection
    pub fn parent(&self) -> Option<DocPath> {
        if self.segments.len() <= 1 {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// The collection a document belongs to, or the collection itself
    pub fn collection_path(&self) -> DocPath {
        if self.is_document() {
            // depth >= 2 so a parent always exists
            self.parent().unwrap_or_else(|| self.clone())
        } else {
            self.clone()
        }
    }

    /// Append a segment
    pub fn child(&self, segment: &str) -> StoreResult<DocPath> {
        let mut raw = self.to_string();
        raw.push('/');
        raw.push_str(segment);
        let child = Self::parse(&raw)?;
        if child.depth() != self.depth() + 1 {
            return Err(StoreError::invalid_path(&raw, "segment must not contain '/'"));
        }
        Ok(child)
    }

    /// True when `self` equals `prefix` or lies below it
    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    pub fn expect_document(self) -> StoreResult<Self> {
        if self.is_document() {
            Ok(self)
        } else {
            Err(StoreError::NotADocument(self.to_string()))
        }
    }

    pub fn expect_collection(self) -> StoreResult<Self> {
        if self.is_collection() {
            Ok(self)
        } else {
            Err(StoreError::NotACollection(self.to_string()))
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for DocPath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DocPath {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(path: DocPath) -> Self {
        path.to_string()
    }
}
