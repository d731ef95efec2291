//! Airwave transport layer
//!
//! One long-lived bidirectional message channel per client. WebSocket
//! is the only transport; the traits keep the server loop testable
//! against in-process implementations.

pub mod error;
pub mod traits;
pub mod websocket;

pub use error::{Result, TransportError};
pub use traits::{Transport, TransportEvent, TransportReceiver, TransportSender, TransportServer};
pub use websocket::{WebSocketConfig, WebSocketServer, WebSocketTransport};
