//! Session management

use airwave_core::{Message, WelcomeMessage, PROTOCOL_VERSION};
use airwave_transport::TransportSender;
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Session identifier; this is the connection id that names members
/// and hosts throughout the protocol
pub type SessionId = String;

/// A connected client session
pub struct Session {
    /// Unique session ID
    pub id: SessionId,
    /// Client-provided display name
    pub name: String,
    /// Transport sender for this session
    sender: Arc<dyn TransportSender>,
    /// Station this session currently belongs to (at most one)
    station: RwLock<Option<String>>,
    /// Session creation time
    pub created_at: Instant,
    /// Last activity time
    last_activity: RwLock<Instant>,
}

impl Session {
    pub fn new(sender: Arc<dyn TransportSender>, name: String) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            sender,
            station: RwLock::new(None),
            created_at: now,
            last_activity: RwLock::new(now),
        }
    }

    /// Send a raw frame to this session
    pub async fn send(&self, data: Bytes) -> Result<(), airwave_transport::TransportError> {
        self.sender.send(data).await?;
        *self.last_activity.write() = Instant::now();
        Ok(())
    }

    /// Send a protocol message
    pub async fn send_message(&self, message: &Message) -> Result<(), airwave_core::Error> {
        let data = airwave_core::codec::encode(message)?;
        self.send(data)
            .await
            .map_err(|e| airwave_core::Error::ConnectionError(e.to_string()))?;
        Ok(())
    }

    /// Create the welcome message for this session
    pub fn welcome_message(&self, server_name: &str) -> Message {
        Message::Welcome(WelcomeMessage {
            version: PROTOCOL_VERSION,
            session: self.id.clone(),
            server: server_name.to_string(),
        })
    }

    /// Station this session is currently in
    pub fn current_station(&self) -> Option<String> {
        self.station.read().clone()
    }

    pub fn set_station(&self, station_id: &str) {
        *self.station.write() = Some(station_id.to_string());
    }

    /// Clear the station slot if it still names `station_id`
    pub fn clear_station(&self, station_id: &str) {
        let mut slot = self.station.write();
        if slot.as_deref() == Some(station_id) {
            *slot = None;
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected()
    }

    pub fn idle_duration(&self) -> std::time::Duration {
        self.last_activity.read().elapsed()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("station", &self.station.read())
            .finish()
    }
}
