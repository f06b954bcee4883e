//! Retargetable subscription
//!
//! Mirrors how a view holds one subscription whose path and options may
//! change over its lifetime: a change closes the old listener first, then
//! opens a new one. An unchanged target is left alone.

use std::sync::Arc;

use super::listener::{subscribe, Subscription};
use super::{LiveState, Snapshot};
use crate::store::{DocumentStore, QueryOptions};

pub struct LiveQuery {
    store: Arc<DocumentStore>,
    path: Option<String>,
    options: QueryOptions,
    current: Subscription<Snapshot>,
}

impl LiveQuery {
    /// Start with no target
    pub fn new(store: Arc<DocumentStore>) -> Self {
        Self {
            store,
            path: None,
            options: QueryOptions::default(),
            current: Subscription::idle(Snapshot::empty_for(None)),
        }
    }

    /// Point the query at a new path/options pair
    ///
    /// Returns true when the underlying subscription was replaced.
    pub fn retarget(&mut self, path: Option<&str>, options: QueryOptions) -> bool {
        let path = path.map(str::trim).filter(|p| !p.is_empty()).map(str::to_string);
        if path == self.path && options == self.options {
            return false;
        }

        self.current.close();
        self.current = subscribe(&self.store, path.as_deref(), options.clone());
        self.path = path;
        self.options = options;
        true
    }

    pub fn state(&self) -> LiveState<Snapshot> {
        self.current.state()
    }

    /// Wait for the next update of the current target
    pub async fn changed(&mut self) -> bool {
        self.current.changed().await
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_active()
    }

    /// Close the current subscription and forget the target
    pub fn close(&mut self) {
        self.current.close();
        self.path = None;
        self.options = QueryOptions::default();
    }
}
