//! Document Store Engine
//!
//! Holds every collection in memory, publishes a `ChangeEvent` for each
//! mutation and persists a JSON snapshot of the whole store.
//!
//! - Write path: mutation → in-memory collection → change broadcast → dirty flag
//! - Flush path: dirty flag → snapshot file (`documents.json`), periodic or on shutdown
//!
//! Thread-safe via Tokio's async RwLock for concurrent access.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, Duration};

use super::error::{StoreError, StoreResult};
use super::path::DocPath;
use super::query::QueryOptions;
use super::types::{ChangeEvent, ChangeKind, Document, Fields, StoreStats};

/// Configuration for the document store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the snapshot file
    pub data_dir: PathBuf,
    /// Interval between background flushes in milliseconds (default: 5000)
    pub flush_interval_ms: u64,
    /// Capacity of the change broadcast channel
    pub change_capacity: usize,
    /// Write snapshots to disk; disabled for in-memory stores
    pub persist: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("portal_data"),
            flush_interval_ms: 5000,
            change_capacity: 1024,
            persist: true,
        }
    }
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// A store that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            persist: false,
            ..Default::default()
        }
    }

    /// Get path to the snapshot file
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("documents.json")
    }
}

/// Collection path → (document id → document)
type Collections = HashMap<String, BTreeMap<String, Document>>;

/// The document store
pub struct DocumentStore {
    config: StoreConfig,
    collections: RwLock<Collections>,
    changes: broadcast::Sender<ChangeEvent>,
    dirty: AtomicBool,
    shutdown: AtomicBool,
}

impl DocumentStore {
    /// Open a store, loading the snapshot if one exists
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let collections = if config.persist {
            std::fs::create_dir_all(&config.data_dir)?;
            load_snapshot(&config.snapshot_path())?
        } else {
            Collections::new()
        };

        let (changes, _) = broadcast::channel(config.change_capacity.max(1));

        let store = Self {
            config,
            collections: RwLock::new(collections),
            changes,
            dirty: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        };

        let stats = store.stats().await;
        tracing::info!(data_dir = ?store.config.data_dir, %stats, "Document store opened");
        Ok(store)
    }

    /// Open a non-persistent store
    pub fn in_memory() -> Self {
        let (changes, _) = broadcast::channel(StoreConfig::in_memory().change_capacity);
        Self {
            config: StoreConfig::in_memory(),
            collections: RwLock::new(Collections::new()),
            changes,
            dirty: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Fetch a single document
    pub async fn get(&self, path: &DocPath) -> StoreResult<Option<Document>> {
        let path = path.clone().expect_document()?;
        let collection = path.collection_path().to_string();

        let collections = self.collections.read().await;
        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(path.id()))
            .cloned())
    }

    /// List a collection through query options
    pub async fn list(&self, path: &DocPath, options: &QueryOptions) -> StoreResult<Vec<Document>> {
        let path = path.clone().expect_collection()?;
        options.validate()?;

        let collections = self.collections.read().await;
        let docs = collections
            .get(&path.to_string())
            .map(|docs| docs.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();

        Ok(options.apply(docs))
    }

    /// Create or replace a document
    pub async fn set(&self, path: &DocPath, data: Fields) -> StoreResult<Document> {
        let path = path.clone().expect_document()?;
        let collection = path.collection_path().to_string();

        let (doc, kind) = {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection.clone()).or_default();

            let mut doc = Document::new(path.id(), path.to_string(), data);
            let kind = match docs.get(path.id()) {
                Some(existing) => {
                    doc.create_time = existing.create_time;
                    ChangeKind::Modified
                }
                None => ChangeKind::Added,
            };
            docs.insert(path.id().to_string(), doc.clone());
            (doc, kind)
        };

        self.notify(kind, &path, collection);
        Ok(doc)
    }

    /// Shallow-merge fields into an existing document
    pub async fn update(&self, path: &DocPath, patch: Fields) -> StoreResult<Document> {
        let path = path.clone().expect_document()?;
        let collection = path.collection_path().to_string();

        let doc = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(path.id()))
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;

            doc.data.extend(patch);
            doc.update_time = chrono::Utc::now().timestamp_millis();
            doc.clone()
        };

        self.notify(ChangeKind::Modified, &path, collection);
        Ok(doc)
    }

    /// Add a document with a generated id
    pub async fn add(&self, collection: &DocPath, data: Fields) -> StoreResult<Document> {
        let collection = collection.clone().expect_collection()?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        let path = collection.child(&id)?;
        self.set(&path, data).await
    }

    /// Delete a document
    pub async fn delete(&self, path: &DocPath) -> StoreResult<Document> {
        let path = path.clone().expect_document()?;
        let collection = path.collection_path().to_string();

        let removed = {
            let mut collections = self.collections.write().await;
            let docs = collections
                .get_mut(&collection)
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            let removed = docs
                .remove(path.id())
                .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
            if docs.is_empty() {
                collections.remove(&collection);
            }
            removed
        };

        self.notify(ChangeKind::Removed, &path, collection);
        Ok(removed)
    }

    /// Receiver for every subsequent change event
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Number of live change receivers (one per active listener)
    pub fn listener_count(&self) -> usize {
        self.changes.receiver_count()
    }

    fn notify(&self, kind: ChangeKind, path: &DocPath, collection: String) {
        self.dirty.store(true, Ordering::SeqCst);

        tracing::debug!(path = %path, kind = %kind, "Document changed");

        // no receivers is fine
        let _ = self.changes.send(ChangeEvent {
            kind,
            path: path.to_string(),
            collection,
        });
    }

    /// Write the snapshot if anything changed since the last flush
    pub async fn flush(&self) -> StoreResult<()> {
        if !self.config.persist || !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let content = {
            let collections = self.collections.read().await;
            serde_json::to_string_pretty(&*collections)?
        };

        let path = self.config.snapshot_path();
        let tmp = path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp, content).and_then(|_| std::fs::rename(&tmp, &path)) {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e.into());
        }

        tracing::debug!(path = ?path, "Snapshot flushed");
        Ok(())
    }

    /// Start the periodic flush task
    pub fn start_background_flush(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        let flush_interval = Duration::from_millis(store.config.flush_interval_ms.max(1));

        tokio::spawn(async move {
            let mut ticker = interval(flush_interval);

            loop {
                ticker.tick().await;

                if store.shutdown.load(Ordering::SeqCst) {
                    break;
                }

                if let Err(e) = store.flush().await {
                    tracing::error!("Background flush failed: {}", e);
                }
            }
        })
    }

    /// Shutdown the store gracefully
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        self.flush().await
    }

    /// True once `shutdown` has been called
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        let collections = self.collections.read().await;
        StoreStats {
            collection_count: collections.len(),
            document_count: collections.values().map(BTreeMap::len).sum(),
            dirty: self.dirty.load(Ordering::SeqCst),
        }
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}

fn load_snapshot(path: &Path) -> StoreResult<Collections> {
    if !path.exists() {
        return Ok(Collections::new());
    }

    let content = std::fs::read_to_string(path)?;
    let collections: Collections = serde_json::from_str(&content)?;
    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = DocumentStore::in_memory();
        store
            .set(&path("restaurants/r1"), fields(json!({"name": "Luigi's"})))
            .await
            .unwrap();

        let doc = store.get(&path("restaurants/r1")).await.unwrap().unwrap();
        assert_eq!(doc.id, "r1");
        assert_eq!(doc.data["name"], json!("Luigi's"));
        assert!(store.get(&path("restaurants/r2")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_shape_errors() {
        let store = DocumentStore::in_memory();
        let err = store.get(&path("restaurants")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotADocument(_)));

        let err = store
            .list(&path("restaurants/r1"), &QueryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotACollection(_)));
    }

    #[tokio::test]
    async fn test_update_merges_and_requires_existing() {
        let store = DocumentStore::in_memory();
        let p = path("restaurants/r1/orders/o1");
        let err = store.update(&p, fields(json!({"status": "done"}))).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));

        let created = store
            .set(&p, fields(json!({"status": "pending", "total": 10})))
            .await
            .unwrap();
        let updated = store.update(&p, fields(json!({"status": "done"}))).await.unwrap();
        assert_eq!(updated.data["status"], json!("done"));
        assert_eq!(updated.data["total"], json!(10));
        assert_eq!(updated.create_time, created.create_time);
    }

    #[tokio::test]
    async fn test_add_and_list_subcollection() {
        let store = DocumentStore::in_memory();
        let orders = path("restaurants/r1/orders");
        store.add(&orders, fields(json!({"total": 5}))).await.unwrap();
        store.add(&orders, fields(json!({"total": 15}))).await.unwrap();
        store
            .add(&path("restaurants/r2/orders"), fields(json!({"total": 99})))
            .await
            .unwrap();

        let docs = store.list(&orders, &QueryOptions::default()).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.path.starts_with("restaurants/r1/orders/")));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = DocumentStore::in_memory();
        let p = path("restaurants/r1/menu/m1");
        store.set(&p, fields(json!({"name": "Soup"}))).await.unwrap();
        store.delete(&p).await.unwrap();
        assert!(store.get(&p).await.unwrap().is_none());
        assert!(matches!(store.delete(&p).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_change_events() {
        let store = DocumentStore::in_memory();
        let mut rx = store.subscribe_changes();
        let p = path("offices/o1/calls/c1");

        store.set(&p, fields(json!({"from": "+15550100"}))).await.unwrap();
        store.set(&p, fields(json!({"from": "+15550101"}))).await.unwrap();
        store.delete(&p).await.unwrap();

        let kinds: Vec<ChangeKind> = (0..3).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![ChangeKind::Added, ChangeKind::Modified, ChangeKind::Removed]
        );
    }

    #[tokio::test]
    async fn test_snapshot_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = DocumentStore::open(StoreConfig::new(dir.path())).await.unwrap();
            store
                .set(&path("agents/a1"), fields(json!({"name": "Dana"})))
                .await
                .unwrap();
            assert!(store.stats().await.dirty);
            store.shutdown().await.unwrap();
        }

        let store = DocumentStore::open(StoreConfig::new(dir.path())).await.unwrap();
        let doc = store.get(&path("agents/a1")).await.unwrap().unwrap();
        assert_eq!(doc.data["name"], json!("Dana"));
        let stats = store.stats().await;
        assert_eq!(stats.document_count, 1);
        assert!(!stats.dirty);
    }
}
