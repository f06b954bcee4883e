//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::auth::AuthDirectory;
use crate::store::DocumentStore;
use crate::websocket::{ConnectionHub, HubConfig};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Tenant documents
    pub store: Arc<DocumentStore>,
    /// Accounts and sessions
    pub auth: Arc<AuthDirectory>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
    /// WebSocket listen channel
    pub ws_hub: Arc<ConnectionHub>,
}

impl AppState {
    pub fn new(store: Arc<DocumentStore>, auth: Arc<AuthDirectory>, config: ApiConfig) -> Self {
        Self::with_ws_config(store, auth, config, HubConfig::default())
    }

    /// Create AppState with custom WebSocket hub configuration
    ///
    /// Spawns the hub's revocation watch, so call it inside a Tokio runtime.
    pub fn with_ws_config(
        store: Arc<DocumentStore>,
        auth: Arc<AuthDirectory>,
        config: ApiConfig,
        hub_config: HubConfig,
    ) -> Self {
        let ws_hub = Arc::new(ConnectionHub::new(Arc::clone(&store), Arc::clone(&auth), hub_config));
        ws_hub.watch_revocations();

        Self {
            ws_hub,
            store,
            auth,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Largest `limit` accepted on list requests
    pub max_list_limit: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 10 * 1024 * 1024,
            max_list_limit: 500,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
