//! WebSocket Message Types
//!
//! Messages exchanged between dashboard clients and the portal server over
//! the listen channel.

use serde::{Deserialize, Serialize};

use crate::store::QueryOptions;
use crate::subscription::{LiveState, Snapshot};

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start (or retarget) a live subscription
    Listen {
        /// Client-chosen listener id, echoed on every snapshot
        id: String,
        /// Collection or document path
        path: String,
        #[serde(default)]
        options: QueryOptions,
    },
    /// Stop a live subscription
    Unlisten { id: String },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { connection_id: String },
    /// Listener accepted
    Listening { id: String },
    /// Current state of a listener
    Snapshot {
        id: String,
        data: Snapshot,
        loading: bool,
        error: Option<String>,
    },
    /// Listener removed
    Unlistened { id: String },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    pub fn snapshot(id: &str, state: LiveState<Snapshot>) -> Self {
        ServerMessage::Snapshot {
            id: id.to_string(),
            data: state.data,
            loading: state.loading,
            error: state.error,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
