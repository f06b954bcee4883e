//! Subscription handles and their listener tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::source::{CollectionSource, DocumentSource, Source, TargetSource};
use super::{target_for, LiveState, Snapshot, Target};
use crate::store::{ChangeEvent, Document, DocumentStore, QueryOptions, StoreError};

/// A live view over one collection query or one document
///
/// Dropping the handle closes the subscription.
pub struct Subscription<T> {
    path: Option<String>,
    rx: Option<watch::Receiver<LiveState<T>>>,
    last: LiveState<T>,
    closed: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

pub type CollectionSubscription = Subscription<Vec<Document>>;
pub type DocumentSubscription = Subscription<Option<Document>>;

impl<T: Clone> Subscription<T> {
    /// A subscription that was never opened (no path)
    pub fn idle(data: T) -> Self {
        Self::detached(None, LiveState::idle(data))
    }

    /// A subscription that failed before a listener could start
    pub fn failed(path: Option<String>, data: T, error: impl Into<String>) -> Self {
        Self::detached(path, LiveState::failed(data, error))
    }

    fn detached(path: Option<String>, state: LiveState<T>) -> Self {
        Self {
            path,
            rx: None,
            last: state,
            closed: Arc::new(AtomicBool::new(true)),
            task: None,
        }
    }

    /// Current state
    pub fn state(&self) -> LiveState<T> {
        match &self.rx {
            Some(rx) => rx.borrow().clone(),
            None => self.last.clone(),
        }
    }

    /// Wait for the next state update
    ///
    /// Returns false once the subscription is closed or was never opened.
    pub async fn changed(&mut self) -> bool {
        match self.rx.as_mut() {
            Some(rx) => rx.changed().await.is_ok(),
            None => false,
        }
    }

    /// Path this subscription listens to
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// True while a listener task is attached
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    /// Tear down the listener. The state is frozen at its last value.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);

        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!(path = ?self.path, "Subscription closed");
        }

        if let Some(rx) = self.rx.take() {
            self.last = rx.borrow().clone();
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Start a listener task for a source
fn open<S: Source>(store: &Arc<DocumentStore>, path: String, source: S) -> Subscription<S::Output> {
    let initial = LiveState::loading(source.empty());
    let (tx, rx) = watch::channel(initial.clone());
    let closed = Arc::new(AtomicBool::new(false));

    // subscribe before the first read so no change falls between the two
    let changes = store.subscribe_changes();
    let task = tokio::spawn(run_listener(
        source,
        Arc::downgrade(store),
        changes,
        tx,
        Arc::clone(&closed),
    ));

    tracing::debug!(path = %path, "Subscription opened");

    Subscription {
        path: Some(path),
        rx: Some(rx),
        last: initial,
        closed,
        task: Some(task),
    }
}

async fn run_listener<S: Source>(
    source: S,
    store: Weak<DocumentStore>,
    mut changes: broadcast::Receiver<ChangeEvent>,
    tx: watch::Sender<LiveState<S::Output>>,
    closed: Arc<AtomicBool>,
) {
    if !refresh(&source, &store, &tx, &closed).await {
        return;
    }

    loop {
        match changes.recv().await {
            Ok(event) => {
                if !source.is_affected_by(&event) {
                    continue;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Subscription lagged behind store changes, refreshing");
            }
            Err(RecvError::Closed) => {
                let data = tx.borrow().data.clone();
                publish(&tx, &closed, LiveState::failed(data, "document store closed"));
                return;
            }
        }

        if closed.load(Ordering::SeqCst) || !refresh(&source, &store, &tx, &closed).await {
            return;
        }
    }
}

/// Re-read the source and publish. Returns false when the store is gone.
async fn refresh<S: Source>(
    source: &S,
    store: &Weak<DocumentStore>,
    tx: &watch::Sender<LiveState<S::Output>>,
    closed: &AtomicBool,
) -> bool {
    let Some(store) = store.upgrade() else {
        let data = tx.borrow().data.clone();
        publish(tx, closed, LiveState::failed(data, "document store closed"));
        return false;
    };

    let next = match source.fetch(&store).await {
        Ok(data) => LiveState::ready(data),
        Err(e) => {
            tracing::warn!(error = %e, "Subscription read failed");
            let data = tx.borrow().data.clone();
            LiveState::failed(data, e.to_string())
        }
    };

    publish(tx, closed, next);
    true
}

fn publish<T: PartialEq>(tx: &watch::Sender<LiveState<T>>, closed: &AtomicBool, next: LiveState<T>) {
    tx.send_if_modified(|state| {
        if closed.load(Ordering::SeqCst) || *state == next {
            return false;
        }
        *state = next;
        true
    });
}

fn normalize(path: Option<&str>) -> Option<&str> {
    path.map(str::trim).filter(|p| !p.is_empty())
}

/// Subscribe to a collection query
///
/// `None` or an empty path opens nothing and reports an idle state.
pub fn subscribe_collection(
    store: &Arc<DocumentStore>,
    path: Option<&str>,
    options: QueryOptions,
) -> CollectionSubscription {
    let Some(raw) = normalize(path) else {
        return Subscription::idle(Vec::new());
    };

    let target = target_for(raw).and_then(|target| match target {
        Target::Collection(path) => Ok(path),
        Target::Document(path) => Err(StoreError::NotACollection(path.to_string())),
    });

    match target.and_then(|path| options.validate().map(|_| path)) {
        Ok(path) => open(store, raw.to_string(), CollectionSource::new(path, options)),
        Err(e) => Subscription::failed(Some(raw.to_string()), Vec::new(), e.to_string()),
    }
}

/// Subscribe to a single document
pub fn subscribe_document(store: &Arc<DocumentStore>, path: Option<&str>) -> DocumentSubscription {
    let Some(raw) = normalize(path) else {
        return Subscription::idle(None);
    };

    match target_for(raw) {
        Ok(Target::Document(path)) => open(store, raw.to_string(), DocumentSource::new(path)),
        Ok(Target::Collection(path)) => Subscription::failed(
            Some(raw.to_string()),
            None,
            StoreError::NotADocument(path.to_string()).to_string(),
        ),
        Err(e) => Subscription::failed(Some(raw.to_string()), None, e.to_string()),
    }
}

/// Subscribe to whatever the path addresses
pub fn subscribe(
    store: &Arc<DocumentStore>,
    path: Option<&str>,
    options: QueryOptions,
) -> Subscription<Snapshot> {
    let Some(raw) = normalize(path) else {
        return Subscription::idle(Snapshot::empty_for(None));
    };

    let target = match target_for(raw) {
        Ok(target) => target,
        Err(e) => {
            return Subscription::failed(Some(raw.to_string()), Snapshot::empty_for(None), e.to_string())
        }
    };

    if target.is_collection() {
        if let Err(e) = options.validate() {
            return Subscription::failed(
                Some(raw.to_string()),
                Snapshot::empty_for(Some(&target)),
                e.to_string(),
            );
        }
    }

    open(store, raw.to_string(), TargetSource::new(target, options))
}
