//! WebSocket Connection Hub
//!
//! Tracks connections and the live listeners each one owns. A listener is
//! a forwarding task that turns subscription state changes into
//! `snapshot` messages on the connection's outbound channel.
//!
//! A connection keeps the bearer token it was opened with. Every `listen`
//! re-resolves it, and revoked credentials close the connection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::messages::ServerMessage;
use crate::auth::{AuthDirectory, AuthUser, Revocation};
use crate::store::{DocumentStore, QueryOptions};
use crate::subscription::{subscribe, target_for, Snapshot, Subscription};

/// Unique identifier for a WebSocket connection
pub type ConnectionId = String;

/// Sent before a revoked connection is closed
const REVOKED_MESSAGE: &str = "Session revoked, reconnect to continue";

/// Configuration for the connection hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Maximum live listeners on a single connection
    pub max_listeners_per_connection: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            max_listeners_per_connection: 32,
        }
    }
}

/// Closed flag a forwarder holds while it sends
///
/// Once `close` returns, no further message gets through.
#[derive(Clone, Default)]
struct SendGate(Arc<Mutex<bool>>);

impl SendGate {
    fn send(&self, sender: &mpsc::UnboundedSender<ServerMessage>, message: ServerMessage) -> bool {
        let closed = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        !*closed && sender.send(message).is_ok()
    }

    fn close(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = true;
    }
}

struct Listener {
    gate: SendGate,
    task: JoinHandle<()>,
}

impl Listener {
    fn stop(self) {
        self.gate.close();
        self.task.abort();
    }
}

/// Per-connection state
struct ConnectionHandle {
    sender: mpsc::UnboundedSender<ServerMessage>,
    uid: String,
    token: String,
    /// Listener id → forwarding task
    listeners: HashMap<String, Listener>,
}

impl ConnectionHandle {
    fn stop_all(&mut self) {
        for (_, listener) in self.listeners.drain() {
            listener.stop();
        }
    }

    fn is_revoked_by(&self, revocation: &Revocation) -> bool {
        match revocation {
            Revocation::Session(token) => self.token == *token,
            Revocation::User(uid) => self.uid == *uid,
        }
    }
}

/// Manages all WebSocket connections and their listeners
pub struct ConnectionHub {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
    store: Arc<DocumentStore>,
    auth: Arc<AuthDirectory>,
    config: HubConfig,
}

impl ConnectionHub {
    pub fn new(store: Arc<DocumentStore>, auth: Arc<AuthDirectory>, config: HubConfig) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            store,
            auth,
            config,
        }
    }

    /// Register a new WebSocket connection opened with `token`
    pub async fn register(
        &self,
        user: &AuthUser,
        token: &str,
        sender: mpsc::UnboundedSender<ServerMessage>,
    ) -> Result<ConnectionId, HubError> {
        let mut connections = self.connections.write().await;
        if connections.len() >= self.config.max_connections {
            return Err(HubError::TooManyConnections(self.config.max_connections));
        }

        let id = Uuid::new_v4().to_string();
        tracing::info!(connection_id = %id, uid = %user.uid, "WebSocket connected");

        connections.insert(
            id.clone(),
            ConnectionHandle {
                sender,
                uid: user.uid.clone(),
                token: token.to_string(),
                listeners: HashMap::new(),
            },
        );
        Ok(id)
    }

    /// Unregister a connection and stop every listener it owns
    pub async fn unregister(&self, id: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(mut handle) = handle {
            let listeners = handle.listeners.len();
            handle.stop_all();
            tracing::info!(connection_id = %id, listeners, "WebSocket disconnected");
        }
    }

    /// Start a listener, replacing any listener with the same id
    pub async fn listen(
        &self,
        id: &str,
        listen_id: &str,
        path: &str,
        options: QueryOptions,
    ) -> Result<(), HubError> {
        let target = target_for(path).map_err(|e| HubError::InvalidPath(e.to_string()))?;
        options
            .validate()
            .map_err(|e| HubError::InvalidQuery(e.to_string()))?;

        let token = self
            .connections
            .read()
            .await
            .get(id)
            .map(|h| h.token.clone())
            .ok_or(HubError::ConnectionNotFound)?;

        let user = match self.auth.resolve(&token).await {
            Ok(user) => user,
            Err(e) => {
                self.close(id, REVOKED_MESSAGE).await;
                return Err(HubError::Unauthorized(e.to_string()));
            }
        };
        if !user.can_access(target.path()) {
            return Err(HubError::Forbidden(target.path().to_string()));
        }

        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        let replacing = handle.listeners.contains_key(listen_id);
        if !replacing && handle.listeners.len() >= self.config.max_listeners_per_connection {
            return Err(HubError::TooManyListeners(self.config.max_listeners_per_connection));
        }

        if let Some(previous) = handle.listeners.remove(listen_id) {
            previous.stop();
        }

        handle
            .sender
            .send(ServerMessage::Listening {
                id: listen_id.to_string(),
            })
            .map_err(|_| HubError::SendFailed)?;

        let gate = SendGate::default();
        let task = spawn_forwarder(
            subscribe(&self.store, Some(path), options),
            listen_id.to_string(),
            handle.sender.clone(),
            gate.clone(),
        );
        handle.listeners.insert(listen_id.to_string(), Listener { gate, task });

        tracing::debug!(connection_id = %id, listen_id = %listen_id, path = %target.path(), "Listener started");
        Ok(())
    }

    /// Stop a listener; returns whether it existed
    pub async fn unlisten(&self, id: &str, listen_id: &str) -> Result<bool, HubError> {
        let mut connections = self.connections.write().await;
        let handle = connections.get_mut(id).ok_or(HubError::ConnectionNotFound)?;

        match handle.listeners.remove(listen_id) {
            Some(listener) => {
                listener.stop();
                tracing::debug!(connection_id = %id, listen_id = %listen_id, "Listener stopped");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Send a message directly to a specific connection
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> Result<(), HubError> {
        let connections = self.connections.read().await;
        let handle = connections.get(id).ok_or(HubError::ConnectionNotFound)?;

        handle.sender.send(message).map_err(|_| HubError::SendFailed)
    }

    /// Close every connection the revocation applies to
    ///
    /// Each gets a final error message; dropping its sender ends the socket.
    pub async fn revoke(&self, revocation: &Revocation) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .read()
            .await
            .iter()
            .filter(|(_, handle)| handle.is_revoked_by(revocation))
            .map(|(id, _)| id.clone())
            .collect();

        for id in &ids {
            self.close(id, REVOKED_MESSAGE).await;
        }
        ids.len()
    }

    /// Close every connection whose token no longer resolves
    pub async fn revalidate(&self) -> usize {
        let tokens: Vec<(ConnectionId, String)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, handle)| (id.clone(), handle.token.clone()))
            .collect();

        let mut closed = 0;
        for (id, token) in tokens {
            if self.auth.resolve(&token).await.is_err() {
                self.close(&id, REVOKED_MESSAGE).await;
                closed += 1;
            }
        }
        closed
    }

    async fn close(&self, id: &str, reason: &str) {
        let handle = self.connections.write().await.remove(id);

        if let Some(mut handle) = handle {
            handle.stop_all();
            let _ = handle.sender.send(ServerMessage::error(reason));
            tracing::info!(connection_id = %id, uid = %handle.uid, reason, "WebSocket closed by server");
        }
    }

    /// Close connections as the directory revokes their credentials
    pub fn watch_revocations(self: &Arc<Self>) -> JoinHandle<()> {
        let revocations = self.auth.subscribe_revocations();
        tokio::spawn(run_revocation_watch(Arc::downgrade(self), revocations))
    }

    /// Get the current connection count
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Live listeners on one connection
    pub async fn listener_count(&self, id: &str) -> usize {
        self.connections
            .read()
            .await
            .get(id)
            .map(|h| h.listeners.len())
            .unwrap_or(0)
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }
}

async fn run_revocation_watch(hub: Weak<ConnectionHub>, mut revocations: broadcast::Receiver<Revocation>) {
    loop {
        let received = revocations.recv().await;
        let Some(hub) = hub.upgrade() else { return };

        match received {
            Ok(revocation) => {
                hub.revoke(&revocation).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Revocation watch lagged, revalidating every connection");
                hub.revalidate().await;
            }
            Err(RecvError::Closed) => return,
        }
    }
}

/// Forward every state of `subscription` to the connection
///
/// Aborting the task drops the subscription, which closes its listener.
fn spawn_forwarder(
    mut subscription: Subscription<Snapshot>,
    listen_id: String,
    sender: mpsc::UnboundedSender<ServerMessage>,
    gate: SendGate,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let message = ServerMessage::snapshot(&listen_id, subscription.state());
            if !gate.send(&sender, message) {
                break;
            }
            if !subscription.changed().await {
                break;
            }
        }
        subscription.close();
    })
}

/// Errors that can occur in the connection hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many connections (limit: {0})")]
    TooManyConnections(usize),

    #[error("Too many listeners on this connection (limit: {0})")]
    TooManyListeners(usize),

    #[error("Connection not found")]
    ConnectionNotFound,

    #[error("Session no longer valid: {0}")]
    Unauthorized(String),

    #[error("Not allowed to listen to {0}")]
    Forbidden(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Failed to send message")]
    SendFailed,
}
