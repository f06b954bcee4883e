//! Document Store
//!
//! Schema-less document database with real-time change notification:
//!
//! - **path**: Slash-separated collection/document paths
//! - **query**: Declarative filters, ordering and limits
//! - **types**: Documents and change events
//! - **engine**: The store itself, with JSON snapshot persistence
//! - **error**: Error types
//!
//! # Example
//!
//! ```rust,no_run
//! use tenant_portal::store::{DocPath, DocumentStore, QueryOptions, StoreConfig, FilterOp};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DocumentStore::open(StoreConfig::new("./data")).await?;
//!
//!     let orders = DocPath::parse("restaurants/r1/orders")?;
//!     let mut fields = serde_json::Map::new();
//!     fields.insert("status".into(), "pending".into());
//!     store.add(&orders, fields).await?;
//!
//!     let pending = QueryOptions::new().filter("status", FilterOp::Eq, "pending");
//!     let docs = store.list(&orders, &pending).await?;
//!     println!("{} pending orders", docs.len());
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod path;
pub mod query;
pub mod types;

pub use engine::{DocumentStore, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use path::DocPath;
pub use query::{compare_values, Direction, FilterOp, OrderBy, QueryOptions, WhereClause};
pub use types::{ChangeEvent, ChangeKind, Document, Fields, StoreStats};
