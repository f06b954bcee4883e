//! WebSocket Handler
//!
//! Authenticates the upgrade request, then runs the connection lifecycle:
//! one task drains the hub's outbound channel into the socket, another
//! reads client messages.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::hub::ConnectionHub;
use super::messages::{ClientMessage, ServerMessage};
use crate::api::{bearer_token, ApiError, AppState};
use crate::auth::AuthUser;

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// WebSocket upgrade handler
///
/// The token comes from `?token=` (browsers cannot set headers on a
/// WebSocket) or from a bearer `Authorization` header.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsParams>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|t| !t.is_empty())
        .or_else(|| bearer_token(&headers).map(str::to_string))
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;

    let user = state.auth.resolve(&token).await?;
    let hub = Arc::clone(&state.ws_hub);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, user, token)))
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize message");
            None
        }
    }
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>, user: AuthUser, token: String) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let connection_id = match hub.register(&user, &token, tx).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to register WebSocket connection");
            if let Some(msg) = encode(&ServerMessage::error(e.to_string())) {
                let _ = sender.send(msg).await;
            }
            return;
        }
    };

    let connected = ServerMessage::Connected {
        connection_id: connection_id.clone(),
    };
    let sent = match encode(&connected) {
        Some(msg) => sender.send(msg).await.is_ok(),
        None => false,
    };
    if !sent {
        tracing::error!(connection_id = %connection_id, "Failed to send connected message");
        hub.unregister(&connection_id).await;
        return;
    }

    let conn_id_for_send = connection_id.clone();
    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let Some(frame) = encode(&msg) else { continue };
            if sender.send(frame).await.is_err() {
                tracing::debug!(
                    connection_id = %conn_id_for_send,
                    "WebSocket send failed, closing connection"
                );
                break;
            }
        }
    });

    let hub_for_recv = Arc::clone(&hub);
    let conn_id_for_recv = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(msg) => {
                    if !handle_ws_message(&hub_for_recv, &conn_id_for_recv, msg).await {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn_id_for_recv,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    hub.unregister(&connection_id).await;
}

/// Handle a received WebSocket message
///
/// Returns false if the connection should be closed.
async fn handle_ws_message(hub: &Arc<ConnectionHub>, connection_id: &str, message: Message) -> bool {
    match message {
        Message::Text(text) => {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_client_message(hub, connection_id, client_msg).await,
                Err(e) => {
                    tracing::debug!(connection_id = %connection_id, error = %e, "Invalid client message");
                    let _ = hub
                        .send_to(connection_id, ServerMessage::error(format!("Invalid message format: {}", e)))
                        .await;
                }
            }
            true
        }
        Message::Binary(_) => {
            let _ = hub
                .send_to(connection_id, ServerMessage::error("Binary messages not supported"))
                .await;
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            tracing::debug!(connection_id = %connection_id, "Client requested close");
            false
        }
    }
}

/// Handle a parsed client message
pub(crate) async fn handle_client_message(hub: &ConnectionHub, connection_id: &str, message: ClientMessage) {
    let reply = match message {
        ClientMessage::Listen { id, path, options } => {
            match hub.listen(connection_id, &id, &path, options).await {
                Ok(()) => None,
                Err(e) => {
                    tracing::warn!(connection_id = %connection_id, listen_id = %id, error = %e, "Listen rejected");
                    Some(ServerMessage::error(e.to_string()))
                }
            }
        }
        ClientMessage::Unlisten { id } => match hub.unlisten(connection_id, &id).await {
            Ok(_) => Some(ServerMessage::Unlistened { id }),
            Err(e) => Some(ServerMessage::error(e.to_string())),
        },
        ClientMessage::Ping => Some(ServerMessage::Pong),
    };

    if let Some(reply) = reply {
        let _ = hub.send_to(connection_id, reply).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthDirectory, DirectoryConfig};
    use crate::store::DocumentStore;
    use crate::websocket::HubConfig;

    const TOKEN: &str = "root-token";

    async fn admin_connection() -> (ConnectionHub, String, mpsc::UnboundedReceiver<ServerMessage>) {
        let auth = Arc::new(AuthDirectory::in_memory(DirectoryConfig::default()));
        auth.ensure_bootstrap_admin("root@portal.example", TOKEN).await.unwrap();
        let user = auth.resolve(TOKEN).await.unwrap();

        let hub = ConnectionHub::new(Arc::new(DocumentStore::in_memory()), auth, HubConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let id = hub.register(&user, TOKEN, tx).await.unwrap();
        (hub, id, rx)
    }

    #[tokio::test]
    async fn test_ping_and_unlisten_replies() {
        let (hub, id, mut rx) = admin_connection().await;

        handle_client_message(&hub, &id, ClientMessage::Ping).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Pong)));

        handle_client_message(&hub, &id, ClientMessage::Unlisten { id: "x".to_string() }).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Unlistened { id }) if id == "x"));
    }

    #[tokio::test]
    async fn test_rejected_listen_reports_error() {
        let (hub, id, mut rx) = admin_connection().await;

        let listen = ClientMessage::Listen {
            id: "deep".to_string(),
            path: "a/b/c/d/e/f/g".to_string(),
            options: Default::default(),
        };
        handle_client_message(&hub, &id, listen).await;
        assert!(matches!(rx.recv().await, Some(ServerMessage::Error { .. })));
        assert_eq!(hub.listener_count(&id).await, 0);
    }
}
