//! WebSocket Listen Channel
//!
//! Remote dashboards drive live subscriptions over `/api/ws`.
//!
//! ## Architecture
//!
//! - **ConnectionHub**: connections, their users and their live listeners
//! - **Handler**: authenticates the upgrade and runs the socket tasks
//! - **Messages**: client and server message formats
//!
//! ## Example
//!
//! ```javascript
//! const ws = new WebSocket('ws://localhost:8080/api/ws?token=' + token);
//!
//! ws.onopen = () => {
//!   ws.send(JSON.stringify({
//!     type: 'listen',
//!     id: 'open-orders',
//!     path: 'restaurants/r1/orders',
//!     options: {where: [{field: 'status', op: '==', value: 'open'}], limit: 20},
//!   }));
//! };
//!
//! ws.onmessage = (event) => {
//!   const msg = JSON.parse(event.data);
//!   if (msg.type === 'snapshot') render(msg.id, msg.data, msg.loading, msg.error);
//! };
//! ```

mod handler;
mod hub;
mod messages;

pub use handler::{websocket_handler, WsParams};
pub use hub::{ConnectionHub, ConnectionId, HubConfig, HubError};
pub use messages::{ClientMessage, ServerMessage};
