//! # Tenant Portal
//!
//! Backend for a multi-tenant administration portal serving restaurants,
//! voice-agent offices and real-estate agents from one code base.
//!
//! ## Features
//!
//! - **Document store**: Schema-less collections under per-tenant roots,
//!   persisted as a JSON snapshot
//! - **Live subscriptions**: Collection and document listeners reporting
//!   `{data, loading, error}` on every change
//! - **Tenant isolation**: Role and tenant claims gate every path
//! - **Menu import**: CSV upload into a restaurant's menu
//! - **REST + WebSocket API**: Axum server with a matching client
//!
//! ## Modules
//!
//! - [`store`]: Document store, paths and queries
//! - [`subscription`]: Live listeners over the store
//! - [`auth`]: Accounts, sessions and custom claims
//! - [`import`]: Menu CSV parsing
//! - [`validation`]: Form field checks
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: Live listeners over a socket
//! - [`client`]: REST client used by the CLI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tenant_portal::api::{serve, ApiConfig, AppState};
//! use tenant_portal::auth::{AuthDirectory, DirectoryConfig};
//! use tenant_portal::store::{DocumentStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(DocumentStore::open(StoreConfig::new("./portal_data")).await?);
//!     let auth = Arc::new(AuthDirectory::open(DirectoryConfig::default())?);
//!     auth.ensure_bootstrap_admin("root@portal.example", "change-me").await?;
//!
//!     let config = ApiConfig::default();
//!     serve(AppState::new(Arc::clone(&store), auth, config.clone()), &config).await?;
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod import;
pub mod store;
pub mod subscription;
pub mod validation;
pub mod websocket;

// Re-export top-level types for convenience
pub use store::{
    ChangeEvent, ChangeKind, DocPath, Document, DocumentStore, Fields, FilterOp, QueryOptions,
    StoreConfig, StoreError, StoreResult, StoreStats,
};

pub use subscription::{LiveQuery, LiveState, Snapshot, Subscription};

pub use auth::{AuthDirectory, AuthError, AuthUser, Claims, Role, Tenant, TenantKind};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use websocket::{ClientMessage, ConnectionHub, HubConfig, HubError, ServerMessage};

pub use import::{MenuCsvImporter, MenuImportResult, MenuItem};

pub use client::{ClientError, PortalClient};

pub use config::{Config, ConfigError, LoggingConfig};
