//! Main server implementation
//!
//! The server is transport-agnostic: it accepts connections from any
//! transport that implements the `TransportServer` trait. WebSocket is
//! the default and the one browsers use.
//!
//! # Example
//!
//! ```no_run
//! use airwave_server::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let server = Server::new(ServerConfig::default());
//!     server.serve_websocket("0.0.0.0:7410").await.unwrap();
//! }
//! ```

use airwave_core::{
    codec, ErrorCode, ErrorMessage, Message, StationsListMessage, StationUpdateMessage,
    UserJoinedMessage, UserLeftMessage, HostChangedMessage, CreateAckMessage, JoinAckMessage,
    PROTOCOL_VERSION,
};
use airwave_transport::{
    TransportEvent, TransportReceiver, TransportSender, TransportServer, WebSocketServer,
};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, ServerError},
    multicast::Multicast,
    registry::{LeaveOutcome, StationRegistry},
    session::{Session, SessionId},
};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name, echoed in WELCOME
    pub name: String,
    /// Maximum concurrent sessions
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "Airwave Server".to_string(),
            max_sessions: 256,
        }
    }
}

/// Airwave station server
pub struct Server {
    config: ServerConfig,
    /// Active sessions
    sessions: Arc<DashMap<SessionId, Arc<Session>>>,
    /// Station registry
    registry: Arc<StationRegistry>,
    /// Per-station fan-out groups
    multicast: Arc<Multicast>,
    /// Running flag
    running: Arc<RwLock<bool>>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            sessions: Arc::new(DashMap::new()),
            registry: Arc::new(StationRegistry::new()),
            multicast: Arc::new(Multicast::new()),
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Serve using any TransportServer implementation.
    pub async fn serve_on<S>(&self, mut server: S) -> Result<()>
    where
        S: TransportServer + 'static,
        S::Sender: 'static,
        S::Receiver: 'static,
    {
        info!("Server accepting connections");
        *self.running.write() = true;

        while *self.running.read() {
            match server.accept().await {
                Ok((sender, receiver, addr)) => {
                    info!("New connection from {}", addr);
                    self.handle_connection(Arc::new(sender), receiver, addr);
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }

        Ok(())
    }

    /// Start the server on WebSocket at `addr`, e.g. `"0.0.0.0:7410"`.
    pub async fn serve_websocket(&self, addr: &str) -> Result<()> {
        let server = WebSocketServer::bind(addr).await?;
        info!("WebSocket server listening on {}", addr);
        self.serve_on(server).await
    }

    /// Bind a WebSocket listener without accepting yet.
    ///
    /// Lets callers learn the bound address (port 0 binds) before
    /// handing the listener back to [`Server::serve_on`].
    pub async fn bind_websocket(addr: &str) -> Result<WebSocketServer> {
        Ok(WebSocketServer::bind(addr).await?)
    }

    /// Handle a new connection
    fn handle_connection(
        &self,
        sender: Arc<dyn TransportSender>,
        mut receiver: impl TransportReceiver + 'static,
        addr: SocketAddr,
    ) {
        let sessions = Arc::clone(&self.sessions);
        let registry = Arc::clone(&self.registry);
        let multicast = Arc::clone(&self.multicast);
        let config = self.config.clone();
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let mut session: Option<Arc<Session>> = None;

            while *running.read() {
                match receiver.recv().await {
                    Some(TransportEvent::Data(data)) => match codec::decode(&data) {
                        Ok(msg) => {
                            if let Some(new_session) = handle_message(
                                &msg,
                                &session,
                                &sender,
                                &sessions,
                                &registry,
                                &multicast,
                                &config,
                            )
                            .await
                            {
                                session = Some(new_session);
                            }
                        }
                        Err(e) => {
                            warn!("Decode error from {}: {}", addr, e);
                            let error = Message::Error(ErrorMessage {
                                code: ErrorCode::InvalidMessage as u16,
                                message: e.to_string(),
                            });
                            if let Ok(bytes) = codec::encode(&error) {
                                let _ = sender.send(bytes).await;
                            }
                        }
                    },
                    Some(TransportEvent::Disconnected { reason }) => {
                        info!("Client {} disconnected: {:?}", addr, reason);
                        break;
                    }
                    Some(TransportEvent::Error(e)) => {
                        error!("Transport error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        break;
                    }
                    _ => {}
                }
            }

            // A dropped connection is a departure from whatever station
            // the session was in. Same fan-outs as an explicit leave.
            if let Some(s) = session {
                info!("Removing session {} ({})", s.id, s.name);
                sessions.remove(&s.id);

                let departed = registry.remove_from_all(&s.id);
                multicast.remove_session(&s.id);
                for (station_id, outcome) in &departed {
                    announce_departure(&s.id, station_id, outcome, &sessions, &multicast).await;
                }
                if !departed.is_empty() {
                    broadcast_listing(&sessions, &registry).await;
                }
            }
        });
    }

    /// Stop accepting connections
    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// Number of connected sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Station registry
    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Handle an incoming message.
///
/// Returns the newly created session when the message was a valid HELLO.
/// Every message other than HELLO and PING is ignored until the
/// handshake completes.
async fn handle_message(
    msg: &Message,
    session: &Option<Arc<Session>>,
    sender: &Arc<dyn TransportSender>,
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    registry: &Arc<StationRegistry>,
    multicast: &Arc<Multicast>,
    config: &ServerConfig,
) -> Option<Arc<Session>> {
    match msg {
        Message::Hello(hello) => {
            if hello.version != PROTOCOL_VERSION {
                warn!(
                    "Rejecting client {:?}: protocol version {} (want {})",
                    hello.name, hello.version, PROTOCOL_VERSION
                );
                send_error(
                    sender,
                    ErrorCode::UnsupportedVersion,
                    format!("unsupported protocol version {}", hello.version),
                )
                .await;
                return None;
            }

            if sessions.len() >= config.max_sessions {
                let err = ServerError::ServerFull(config.max_sessions);
                warn!("Rejecting client {:?}: {}", hello.name, err);
                send_error(sender, ErrorCode::ServiceUnavailable, err.to_string()).await;
                return None;
            }

            let new_session = Arc::new(Session::new(sender.clone(), hello.name.clone()));
            let session_id = new_session.id.clone();
            sessions.insert(session_id.clone(), new_session.clone());

            info!("Session created: {} ({})", hello.name, session_id);

            let welcome = new_session.welcome_message(&config.name);
            let _ = new_session.send_message(&welcome).await;

            // Initial listing so a fresh client can render the lobby
            let listing = Message::StationsList(StationsListMessage {
                stations: registry.listing(),
            });
            let _ = new_session.send_message(&listing).await;

            Some(new_session)
        }

        Message::GetStations => {
            let session = session.as_ref()?;
            let listing = Message::StationsList(StationsListMessage {
                stations: registry.listing(),
            });
            let _ = session.send_message(&listing).await;
            None
        }

        Message::CreateStation(create) => {
            let session = session.as_ref()?;

            // At most one station per session
            depart_current(session, sessions, registry, multicast).await;

            let station = registry.create(&create.name, &session.id);
            multicast.subscribe(&station.id, &session.id);
            session.set_station(&station.id);

            debug!("Session {} created station {}", session.id, station.id);

            let ack = Message::CreateAck(CreateAckMessage {
                request_id: create.request_id,
                success: true,
                station_id: station.id.clone(),
                station,
            });
            let _ = session.send_message(&ack).await;

            broadcast_listing(sessions, registry).await;
            None
        }

        Message::JoinStation(join) => {
            let session = session.as_ref()?;

            match registry.join(&join.station_id, &session.id) {
                Ok(outcome) => {
                    // Leaving the previous station only after the join
                    // succeeded keeps a failed join side-effect free.
                    if session.current_station().as_deref() != Some(join.station_id.as_str()) {
                        depart_current(session, sessions, registry, multicast).await;
                    }
                    multicast.subscribe(&join.station_id, &session.id);
                    session.set_station(&join.station_id);

                    let ack = Message::JoinAck(JoinAckMessage {
                        request_id: join.request_id,
                        success: true,
                        station: Some(outcome.station.clone()),
                        message: None,
                    });
                    let _ = session.send_message(&ack).await;

                    if outcome.newly_joined {
                        let joined = Message::UserJoined(UserJoinedMessage {
                            user_id: session.id.clone(),
                            count: outcome.station.listener_count(),
                            station: outcome.station,
                        });
                        fan_out(&join.station_id, &joined, sessions, multicast, Some(&session.id))
                            .await;
                        broadcast_listing(sessions, registry).await;
                    }
                }
                Err(e) => {
                    debug!(
                        "Session {} failed to join station {}: {}",
                        session.id, join.station_id, e
                    );
                    let ack = Message::JoinAck(JoinAckMessage {
                        request_id: join.request_id,
                        success: false,
                        station: None,
                        message: Some("Station not found".to_string()),
                    });
                    let _ = session.send_message(&ack).await;
                }
            }
            None
        }

        Message::LeaveStation(leave) => {
            let session = session.as_ref()?;

            if let Some(outcome) = registry.leave(&leave.station_id, &session.id) {
                let sub = crate::multicast::TopicSubscription {
                    station_id: leave.station_id.clone(),
                    session_id: session.id.clone(),
                };
                multicast.unsubscribe(&sub);
                session.clear_station(&leave.station_id);

                announce_departure(&session.id, &leave.station_id, &outcome, sessions, multicast)
                    .await;
                broadcast_listing(sessions, registry).await;
            }
            None
        }

        Message::PlayerAction(action_msg) => {
            let session = session.as_ref()?;

            // Any member may mutate; a missing station is a silent no-op
            match registry.apply(&action_msg.station_id, &action_msg.action) {
                Some(station) => {
                    let update = Message::StationUpdate(StationUpdateMessage {
                        action: action_msg.action.clone(),
                        station,
                    });
                    fan_out(&action_msg.station_id, &update, sessions, multicast, None).await;

                    if action_msg.action.affects_listing() {
                        broadcast_listing(sessions, registry).await;
                    }
                }
                None => {
                    debug!(
                        "Dropping action for unknown station {} from {}",
                        action_msg.station_id, session.id
                    );
                }
            }
            None
        }

        Message::Ping => {
            if let Ok(bytes) = codec::encode(&Message::Pong) {
                let _ = sender.send(bytes).await;
            }
            None
        }

        _ => None,
    }
}

/// Remove a session from the station it currently occupies, with the
/// usual departure fan-outs.
async fn depart_current(
    session: &Arc<Session>,
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    registry: &Arc<StationRegistry>,
    multicast: &Arc<Multicast>,
) {
    let Some(station_id) = session.current_station() else {
        return;
    };

    if let Some(outcome) = registry.leave(&station_id, &session.id) {
        let sub = crate::multicast::TopicSubscription {
            station_id: station_id.clone(),
            session_id: session.id.clone(),
        };
        multicast.unsubscribe(&sub);
        announce_departure(&session.id, &station_id, &outcome, sessions, multicast).await;
        broadcast_listing(sessions, registry).await;
    }
    session.clear_station(&station_id);
}

/// USER_LEFT and HOST_CHANGED fan-outs for one departure
async fn announce_departure(
    user_id: &SessionId,
    station_id: &str,
    outcome: &LeaveOutcome,
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    multicast: &Arc<Multicast>,
) {
    if outcome.destroyed {
        debug!("Station {} destroyed", station_id);
        multicast.drop_topic(station_id);
        return;
    }

    let Some(station) = &outcome.station else {
        return;
    };

    let left = Message::UserLeft(UserLeftMessage {
        user_id: user_id.clone(),
        count: outcome.remaining,
        station: station.clone(),
    });
    fan_out(station_id, &left, sessions, multicast, None).await;

    if let Some(new_host) = &outcome.new_host {
        info!("Station {} host changed to {}", station_id, new_host);
        let changed = Message::HostChanged(HostChangedMessage {
            new_host: new_host.clone(),
            station: station.clone(),
        });
        fan_out(station_id, &changed, sessions, multicast, None).await;
    }
}

/// Send a message to every subscriber of a station's topic
async fn fan_out(
    station_id: &str,
    msg: &Message,
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    multicast: &Arc<Multicast>,
    exclude: Option<&SessionId>,
) {
    let Ok(bytes) = codec::encode(msg) else {
        return;
    };
    for member_id in multicast.members(station_id) {
        if exclude == Some(&member_id) {
            continue;
        }
        if let Some(member) = sessions.get(&member_id) {
            let _ = member.send(bytes.clone()).await;
        }
    }
}

/// Push a freshly recomputed listing to every connected session
async fn broadcast_listing(
    sessions: &Arc<DashMap<SessionId, Arc<Session>>>,
    registry: &Arc<StationRegistry>,
) {
    let listing = Message::StationsList(StationsListMessage {
        stations: registry.listing(),
    });
    let Ok(bytes) = codec::encode(&listing) else {
        return;
    };
    for entry in sessions.iter() {
        let _ = entry.value().send(bytes.clone()).await;
    }
}

async fn send_error(sender: &Arc<dyn TransportSender>, code: ErrorCode, message: String) {
    let error = Message::Error(ErrorMessage {
        code: code as u16,
        message,
    });
    if let Ok(bytes) = codec::encode(&error) {
        let _ = sender.send(bytes).await;
    }
}
