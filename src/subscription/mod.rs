//! Live Subscriptions
//!
//! Turns a path plus query options into a continuously-updating
//! `{data, loading, error}` triple backed by the document store.
//!
//! ## Architecture
//!
//! - **Target**: a path resolves to a collection or a document by segment count
//! - **Source**: what a listener re-reads when the store reports a change
//! - **Subscription**: owns one listener task and a `watch` channel of `LiveState`
//! - **LiveQuery**: a retargetable subscription; changing the path or options
//!   closes the previous listener before opening the next one
//!
//! A subscription is always torn down on `close()` or drop, and no state
//! update is observable afterwards. Listener failures are stored in
//! `LiveState::error`, never returned to the caller.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_portal::store::{DocumentStore, QueryOptions, Direction};
//! use tenant_portal::subscription::subscribe_collection;
//!
//! # async fn demo(store: Arc<DocumentStore>) {
//! let options = QueryOptions::new().order_by("createdAt", Direction::Desc).limit(20);
//! let mut orders = subscribe_collection(&store, Some("restaurants/r1/orders"), options);
//!
//! while orders.changed().await {
//!     let state = orders.state();
//!     if let Some(error) = &state.error {
//!         eprintln!("listener failed: {}", error);
//!         break;
//!     }
//!     println!("{} orders (loading: {})", state.data.len(), state.loading);
//! }
//! # }
//! ```

mod listener;
mod live_query;
mod source;

pub use listener::{
    subscribe, subscribe_collection, subscribe_document, CollectionSubscription,
    DocumentSubscription, Subscription,
};
pub use live_query::LiveQuery;

use serde::Serialize;

use crate::store::{DocPath, Document, StoreError, StoreResult};

/// Deepest path a subscription accepts (collection/doc/subcollection/doc/subcollection/doc)
pub const MAX_DEPTH: usize = 6;

/// What a path addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Collection(DocPath),
    Document(DocPath),
}

impl Target {
    pub fn path(&self) -> &DocPath {
        match self {
            Target::Collection(path) | Target::Document(path) => path,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Target::Collection(_))
    }
}

/// Resolve a path to a collection (1, 3, 5 segments) or document (2, 4, 6 segments)
pub fn target_for(path: &str) -> StoreResult<Target> {
    let path = DocPath::parse(path)?;
    if path.depth() > MAX_DEPTH {
        return Err(StoreError::invalid_path(
            &path.to_string(),
            format!("deeper than {} segments", MAX_DEPTH),
        ));
    }

    Ok(if path.is_collection() {
        Target::Collection(path)
    } else {
        Target::Document(path)
    })
}

/// Reactive state exposed to the consumer of a subscription
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> LiveState<T> {
    /// Waiting for the first snapshot
    pub fn loading(data: T) -> Self {
        Self {
            data,
            loading: true,
            error: None,
        }
    }

    /// No subscription was opened
    pub fn idle(data: T) -> Self {
        Self {
            data,
            loading: false,
            error: None,
        }
    }

    pub fn ready(data: T) -> Self {
        Self::idle(data)
    }

    pub fn failed(data: T, error: impl Into<String>) -> Self {
        Self {
            data,
            loading: false,
            error: Some(error.into()),
        }
    }
}

/// Snapshot of either target shape, used where the shape is chosen at runtime
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Documents(Vec<Document>),
    Document(Option<Document>),
}

impl Snapshot {
    /// Empty snapshot matching a target's shape
    pub fn empty_for(target: Option<&Target>) -> Self {
        match target {
            Some(Target::Document(_)) => Snapshot::Document(None),
            _ => Snapshot::Documents(Vec::new()),
        }
    }

    /// Documents in the snapshot, in order
    pub fn documents(&self) -> Vec<&Document> {
        match self {
            Snapshot::Documents(docs) => docs.iter().collect(),
            Snapshot::Document(doc) => doc.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_shape_from_segment_count() {
        let paths = [
            ("restaurants", true),
            ("restaurants/r1", false),
            ("restaurants/r1/orders", true),
            ("restaurants/r1/orders/o1", false),
            ("restaurants/r1/orders/o1/items", true),
            ("restaurants/r1/orders/o1/items/i1", false),
        ];

        for (path, is_collection) in paths {
            let target = target_for(path).unwrap();
            assert_eq!(target.is_collection(), is_collection, "{}", path);
            assert_eq!(target.path().to_string(), path);
            // same input, same answer
            assert_eq!(target_for(path).unwrap(), target);
        }
    }

    #[test]
    fn test_target_rejects_deep_and_empty_paths() {
        assert!(target_for("a/b/c/d/e/f/g").is_err());
        assert!(target_for("").is_err());
        assert!(target_for("a//b").is_err());
    }

    #[test]
    fn test_snapshot_empty_for_shape() {
        let doc = target_for("offices/o1").unwrap();
        assert_eq!(Snapshot::empty_for(Some(&doc)), Snapshot::Document(None));
        assert_eq!(Snapshot::empty_for(None), Snapshot::Documents(Vec::new()));
    }

    #[test]
    fn test_live_state_serializes_triple() {
        let state = LiveState::loading(Vec::<Document>::new());
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json, serde_json::json!({"data": [], "loading": true, "error": null}));
    }
}
