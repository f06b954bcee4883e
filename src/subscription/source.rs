//! Listener sources
//!
//! A source knows which change events concern it and how to re-read its
//! data from the store.

use async_trait::async_trait;

use super::{Snapshot, Target};
use crate::store::{ChangeEvent, DocPath, Document, DocumentStore, QueryOptions, StoreResult};

#[async_trait]
pub(crate) trait Source: Send + Sync + 'static {
    type Output: Clone + PartialEq + Send + Sync + 'static;

    /// Value reported before the first snapshot and on early failure
    fn empty(&self) -> Self::Output;

    fn is_affected_by(&self, event: &ChangeEvent) -> bool;

    async fn fetch(&self, store: &DocumentStore) -> StoreResult<Self::Output>;
}

pub(crate) struct CollectionSource {
    path: DocPath,
    key: String,
    options: QueryOptions,
}

impl CollectionSource {
    pub(crate) fn new(path: DocPath, options: QueryOptions) -> Self {
        Self {
            key: path.to_string(),
            path,
            options,
        }
    }
}

#[async_trait]
impl Source for CollectionSource {
    type Output = Vec<Document>;

    fn empty(&self) -> Self::Output {
        Vec::new()
    }

    fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        event.collection == self.key
    }

    async fn fetch(&self, store: &DocumentStore) -> StoreResult<Self::Output> {
        store.list(&self.path, &self.options).await
    }
}

pub(crate) struct DocumentSource {
    path: DocPath,
    key: String,
}

impl DocumentSource {
    pub(crate) fn new(path: DocPath) -> Self {
        Self {
            key: path.to_string(),
            path,
        }
    }
}

#[async_trait]
impl Source for DocumentSource {
    type Output = Option<Document>;

    fn empty(&self) -> Self::Output {
        None
    }

    fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        event.path == self.key
    }

    async fn fetch(&self, store: &DocumentStore) -> StoreResult<Self::Output> {
        store.get(&self.path).await
    }
}

/// Either shape, chosen from the path at runtime
pub(crate) enum TargetSource {
    Collection(CollectionSource),
    Document(DocumentSource),
}

impl TargetSource {
    pub(crate) fn new(target: Target, options: QueryOptions) -> Self {
        match target {
            Target::Collection(path) => Self::Collection(CollectionSource::new(path, options)),
            Target::Document(path) => Self::Document(DocumentSource::new(path)),
        }
    }
}

#[async_trait]
impl Source for TargetSource {
    type Output = Snapshot;

    fn empty(&self) -> Self::Output {
        match self {
            Self::Collection(_) => Snapshot::Documents(Vec::new()),
            Self::Document(_) => Snapshot::Document(None),
        }
    }

    fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        match self {
            Self::Collection(source) => source.is_affected_by(event),
            Self::Document(source) => source.is_affected_by(event),
        }
    }

    async fn fetch(&self, store: &DocumentStore) -> StoreResult<Self::Output> {
        match self {
            Self::Collection(source) => source.fetch(store).await.map(Snapshot::Documents),
            Self::Document(source) => source.fetch(store).await.map(Snapshot::Document),
        }
    }
}
