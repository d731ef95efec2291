//! Main Airwave client implementation

use airwave_core::{
    codec, CreateStationMessage, ErrorCode, HelloMessage, JoinStationMessage, LeaveStationMessage,
    Message, PlayerAction, PlayerActionMessage, Station, StationSummary, Track, PROTOCOL_VERSION,
};
use airwave_transport::{
    Transport, TransportEvent, TransportReceiver, TransportSender, WebSocketTransport,
};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::builder::AirwaveBuilder;
use crate::error::{ClientError, Result};

/// Station-scoped events surfaced to the application
#[derive(Debug, Clone)]
pub enum StationEvent {
    /// Authoritative snapshot after an accepted player action
    Snapshot {
        action: PlayerAction,
        station: Station,
    },
    UserJoined { user_id: String, station: Station },
    UserLeft { user_id: String, station: Station },
    HostChanged { new_host: String, station: Station },
    /// Lobby listing was recomputed
    Listing(Vec<StationSummary>),
}

/// Event callback type
pub type EventCallback = Box<dyn Fn(&StationEvent) + Send + Sync>;

/// Shared client state written by the receiver task
struct ClientState {
    /// Station the client currently occupies
    current: RwLock<Option<Station>>,
    /// Last lobby listing pushed by the server
    stations: RwLock<Vec<StationSummary>>,
    /// Acked requests keyed by request id
    pending_acks: DashMap<u32, oneshot::Sender<Message>>,
    /// Listing waiters; the next STATIONS_LIST resolves them all
    pending_listings: Mutex<Vec<oneshot::Sender<Vec<StationSummary>>>>,
    /// Registered event callbacks
    callbacks: DashMap<u32, EventCallback>,
}

impl ClientState {
    fn new() -> Self {
        Self {
            current: RwLock::new(None),
            stations: RwLock::new(Vec::new()),
            pending_acks: DashMap::new(),
            pending_listings: Mutex::new(Vec::new()),
            callbacks: DashMap::new(),
        }
    }

    fn emit(&self, event: &StationEvent) {
        for entry in self.callbacks.iter() {
            entry.value()(event);
        }
    }

    /// Replace the current snapshot unless the incoming one is stale.
    ///
    /// Version counters only compare within one station; a snapshot for
    /// a different station always wins.
    fn accept(&self, station: &Station) -> bool {
        let mut current = self.current.write();
        match current.as_ref() {
            Some(held) if held.id == station.id && station.version < held.version => false,
            _ => {
                *current = Some(station.clone());
                true
            }
        }
    }
}

/// An Airwave client
pub struct Airwave {
    url: String,
    name: String,
    request_timeout: Duration,

    /// Session ID (set after connect)
    session_id: RwLock<Option<String>>,

    /// Connection state
    connected: Arc<RwLock<bool>>,

    /// Sender for outgoing messages
    sender: RwLock<Option<mpsc::Sender<Bytes>>>,

    /// Transport handle, kept so close() can send a Close frame
    transport: RwLock<Option<Arc<dyn TransportSender>>>,

    /// Receiver task, shut down on close or drop
    receiver_task: Mutex<Option<tokio::task::JoinHandle<()>>>,

    /// State shared with the receiver task
    state: Arc<ClientState>,

    /// Request ID counter
    next_request_id: AtomicU32,

    /// Callback ID counter
    next_callback_id: AtomicU32,
}

impl std::fmt::Debug for Airwave {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Airwave")
            .field("url", &self.url)
            .field("name", &self.name)
            .field("request_timeout", &self.request_timeout)
            .field("session_id", &self.session_id)
            .field("connected", &self.connected)
            .finish_non_exhaustive()
    }
}

impl Airwave {
    /// Create a new client (use builder for more options)
    pub(crate) fn new(url: &str, name: String, request_timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            name,
            request_timeout,
            session_id: RwLock::new(None),
            connected: Arc::new(RwLock::new(false)),
            sender: RwLock::new(None),
            transport: RwLock::new(None),
            receiver_task: Mutex::new(None),
            state: Arc::new(ClientState::new()),
            next_request_id: AtomicU32::new(1),
            next_callback_id: AtomicU32::new(1),
        }
    }

    /// Create a builder
    pub fn builder(url: &str) -> AirwaveBuilder {
        AirwaveBuilder::new(url)
    }

    /// Connect to server (convenience method)
    pub async fn connect_to(url: &str) -> Result<Self> {
        AirwaveBuilder::new(url).connect().await
    }

    /// Internal connect
    pub(crate) async fn do_connect(&mut self) -> Result<()> {
        if *self.connected.read() {
            return Err(ClientError::AlreadyConnected);
        }

        info!("Connecting to {}", self.url);

        let (sender, mut receiver) = <WebSocketTransport as Transport>::connect(&self.url).await?;

        // Create send channel
        let (tx, mut rx) = mpsc::channel::<Bytes>(100);
        *self.sender.write() = Some(tx);

        let connected = self.connected.clone();

        // Spawn sender task
        let sender: Arc<dyn TransportSender> = Arc::new(sender);
        let sender_clone = sender.clone();
        tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                if let Err(e) = sender_clone.send(data).await {
                    error!("Send error: {}", e);
                    break;
                }
            }
        });
        *self.transport.write() = Some(sender);

        // Send HELLO
        let hello = Message::Hello(HelloMessage {
            version: PROTOCOL_VERSION,
            name: self.name.clone(),
        });
        self.send_message(&hello).await?;

        // Wait for WELCOME
        loop {
            match receiver.recv().await {
                Some(TransportEvent::Data(data)) => match codec::decode(&data) {
                    Ok(Message::Welcome(welcome)) => {
                        *self.session_id.write() = Some(welcome.session.clone());
                        *connected.write() = true;
                        info!("Connected to {}, session: {}", welcome.server, welcome.session);
                        break;
                    }
                    Ok(Message::Error(e)) => {
                        return Err(ClientError::ConnectionFailed(format!(
                            "{} (code {})",
                            e.message, e.code
                        )));
                    }
                    Ok(msg) => {
                        debug!("Received during handshake: {:?}", msg);
                    }
                    Err(e) => {
                        warn!("Decode error: {}", e);
                    }
                },
                Some(TransportEvent::Error(e)) => {
                    return Err(ClientError::ConnectionFailed(e));
                }
                Some(TransportEvent::Disconnected { reason }) => {
                    return Err(ClientError::ConnectionFailed(
                        reason.unwrap_or_else(|| "Disconnected".to_string()),
                    ));
                }
                None => {
                    return Err(ClientError::ConnectionFailed(
                        "Connection closed".to_string(),
                    ));
                }
                _ => {}
            }
        }

        // Spawn receiver task
        let state = Arc::clone(&self.state);
        let connected_clone = Arc::clone(&self.connected);

        let task = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match event {
                    TransportEvent::Data(data) => match codec::decode(&data) {
                        Ok(msg) => handle_message(msg, &state),
                        Err(e) => warn!("Decode error: {}", e),
                    },
                    TransportEvent::Disconnected { reason } => {
                        info!("Disconnected: {:?}", reason);
                        *connected_clone.write() = false;
                        break;
                    }
                    TransportEvent::Error(e) => {
                        error!("Transport error: {}", e);
                    }
                    _ => {}
                }
            }
        });
        *self.receiver_task.lock() = Some(task);

        Ok(())
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        *self.connected.read()
    }

    /// Get session ID
    pub fn session_id(&self) -> Option<String> {
        self.session_id.read().clone()
    }

    /// Station the client is currently in
    pub fn current_station(&self) -> Option<Station> {
        self.state.current.read().clone()
    }

    /// Whether this client hosts its current station
    pub fn is_host(&self) -> bool {
        let session = self.session_id.read();
        let current = self.state.current.read();
        match (session.as_ref(), current.as_ref()) {
            (Some(id), Some(station)) => &station.host == id,
            _ => false,
        }
    }

    /// Last listing pushed by the server, without a round trip
    pub fn cached_stations(&self) -> Vec<StationSummary> {
        self.state.stations.read().clone()
    }

    /// Request a fresh station listing
    pub async fn stations(&self) -> Result<Vec<StationSummary>> {
        let (tx, rx) = oneshot::channel();
        self.state.pending_listings.lock().push(tx);

        self.send_message(&Message::GetStations).await?;

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(stations)) => Ok(stations),
            Ok(Err(_)) => Err(ClientError::Other("Listing cancelled".to_string())),
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// Create a station and become its host.
    ///
    /// Joining or creating while already in a station leaves the old
    /// one first; the server enforces at most one station per session.
    pub async fn create_station(&self, name: &str) -> Result<Station> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.state.pending_acks.insert(request_id, tx);

        let msg = Message::CreateStation(CreateStationMessage {
            request_id,
            name: name.to_string(),
        });
        self.send_message(&msg).await?;

        match self.wait_ack(request_id, rx).await? {
            Message::CreateAck(ack) => {
                debug!("Created station {}", ack.station_id);
                Ok(ack.station)
            }
            msg => Err(ClientError::Other(format!("Unexpected ack: {:?}", msg))),
        }
    }

    /// Join an existing station
    pub async fn join_station(&self, station_id: &str) -> Result<Station> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.state.pending_acks.insert(request_id, tx);

        let msg = Message::JoinStation(JoinStationMessage {
            request_id,
            station_id: station_id.to_string(),
        });
        self.send_message(&msg).await?;

        match self.wait_ack(request_id, rx).await? {
            Message::JoinAck(ack) if ack.success => ack
                .station
                .ok_or_else(|| ClientError::Other("Join ack without station".to_string())),
            Message::JoinAck(ack) => Err(ClientError::JoinRefused(
                ack.message.unwrap_or_else(|| "Station not found".to_string()),
            )),
            msg => Err(ClientError::Other(format!("Unexpected ack: {:?}", msg))),
        }
    }

    /// Leave the current station
    pub async fn leave_station(&self) -> Result<()> {
        let station_id = {
            let mut current = self.state.current.write();
            match current.take() {
                Some(station) => station.id,
                None => return Err(ClientError::NotInStation),
            }
        };

        let msg = Message::LeaveStation(LeaveStationMessage { station_id });
        self.send_message(&msg).await
    }

    /// Resume playback, optionally naming the track to play
    pub async fn play(&self, track: Option<Track>) -> Result<()> {
        self.send_action(PlayerAction::Play { track }).await
    }

    /// Pause playback
    pub async fn pause(&self) -> Result<()> {
        self.send_action(PlayerAction::Pause).await
    }

    /// Seek to `time` seconds
    pub async fn seek(&self, time: f64) -> Result<()> {
        self.send_action(PlayerAction::Seek { time }).await
    }

    /// Switch the station to a new track and start it from zero
    pub async fn change_song(&self, track: Track) -> Result<()> {
        self.send_action(PlayerAction::ChangeSong { track }).await
    }

    /// Send a player action for the current station
    pub async fn send_action(&self, action: PlayerAction) -> Result<()> {
        let station_id = self
            .state
            .current
            .read()
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(ClientError::NotInStation)?;

        let msg = Message::PlayerAction(PlayerActionMessage { station_id, action });
        self.send_message(&msg).await
    }

    /// Register an event callback; returns an id for [`Airwave::off_event`]
    pub fn on_event<F>(&self, callback: F) -> u32
    where
        F: Fn(&StationEvent) + Send + Sync + 'static,
    {
        let id = self.next_callback_id.fetch_add(1, Ordering::SeqCst);
        self.state.callbacks.insert(id, Box::new(callback));
        id
    }

    /// Remove an event callback
    pub fn off_event(&self, id: u32) {
        self.state.callbacks.remove(&id);
    }

    /// Close connection
    ///
    /// Sends a Close frame so the server sees the departure immediately.
    pub async fn close(&self) {
        *self.connected.write() = false;
        *self.sender.write() = None;

        let transport = self.transport.write().take();
        if let Some(transport) = transport {
            if let Err(e) = transport.close().await {
                debug!("Close error: {}", e);
            }
        }

        let task = self.receiver_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
    }

    async fn wait_ack(&self, request_id: u32, rx: oneshot::Receiver<Message>) -> Result<Message> {
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_)) => {
                self.state.pending_acks.remove(&request_id);
                Err(ClientError::Other("Request cancelled".to_string()))
            }
            Err(_) => {
                self.state.pending_acks.remove(&request_id);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Send a raw message
    async fn send_message(&self, message: &Message) -> Result<()> {
        let data = codec::encode(message)?;
        self.send_raw(data).await
    }

    /// Send raw bytes
    async fn send_raw(&self, data: Bytes) -> Result<()> {
        let sender = self.sender.read().clone();
        if let Some(tx) = sender {
            tx.send(data)
                .await
                .map_err(|e| ClientError::SendFailed(e.to_string()))?;
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }
}

impl Drop for Airwave {
    fn drop(&mut self) {
        if let Some(task) = self.receiver_task.lock().take() {
            task.abort();
        }
    }
}

/// Handle an incoming message on the receiver task
fn handle_message(msg: Message, state: &Arc<ClientState>) {
    match msg {
        Message::CreateAck(ack) => {
            state.accept(&ack.station);
            if let Some((_, tx)) = state.pending_acks.remove(&ack.request_id) {
                let _ = tx.send(Message::CreateAck(ack));
            }
        }

        Message::JoinAck(ack) => {
            if let Some(station) = &ack.station {
                state.accept(station);
            }
            if let Some((_, tx)) = state.pending_acks.remove(&ack.request_id) {
                let _ = tx.send(Message::JoinAck(ack));
            }
        }

        Message::StationsList(list) => {
            *state.stations.write() = list.stations.clone();
            for tx in state.pending_listings.lock().drain(..) {
                let _ = tx.send(list.stations.clone());
            }
            state.emit(&StationEvent::Listing(list.stations));
        }

        Message::StationUpdate(update) => {
            if state.accept(&update.station) {
                state.emit(&StationEvent::Snapshot {
                    action: update.action,
                    station: update.station,
                });
            }
        }

        Message::UserJoined(joined) => {
            if state.accept(&joined.station) {
                state.emit(&StationEvent::UserJoined {
                    user_id: joined.user_id,
                    station: joined.station,
                });
            }
        }

        Message::UserLeft(left) => {
            if state.accept(&left.station) {
                state.emit(&StationEvent::UserLeft {
                    user_id: left.user_id,
                    station: left.station,
                });
            }
        }

        Message::HostChanged(changed) => {
            if state.accept(&changed.station) {
                state.emit(&StationEvent::HostChanged {
                    new_host: changed.new_host,
                    station: changed.station,
                });
            }
        }

        Message::Error(e) => match ErrorCode::from_u16(e.code) {
            Some(code) => warn!("Server error {:?}: {}", code, e.message),
            None => warn!("Server error {}: {}", e.code, e.message),
        },

        Message::Pong => {}

        other => {
            debug!("Unhandled message: {:?}", other);
        }
    }
}
