//! Protocol types and message definitions

use serde::{Deserialize, Serialize};

use crate::station::Station;

/// A playable track as described by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Display name; tracks are identified by name on the wire
    pub name: String,
    /// Artist name
    pub artist: String,
    /// Cover art URI
    pub cover_url: String,
    /// Audio stream URI
    pub audio_url: String,
}

impl Track {
    /// Wire-level track identity. Catalogs guarantee unique names.
    pub fn same_as(&self, other: &Track) -> bool {
        self.name == other.name
    }
}

/// Player mutation vocabulary; exactly one variant per protocol action.
///
/// Serialized with an `action` tag so the wire shape stays
/// `{action: "seek", time: 42.0}` while handlers get exhaustive matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Start or resume playback; optionally replaces the current track
    Play {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track: Option<Track>,
    },
    /// Pause playback
    Pause,
    /// Move the playback position (seconds)
    Seek { time: f64 },
    /// Switch tracks; always restarts playing from zero
    ChangeSong { track: Track },
}

impl PlayerAction {
    /// Whether applying this action changes what the public listing shows
    pub fn affects_listing(&self) -> bool {
        matches!(
            self,
            PlayerAction::Play { .. } | PlayerAction::Pause | PlayerAction::ChangeSong { .. }
        )
    }
}

/// Redacted public listing entry; excludes member ids and host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationSummary {
    pub id: String,
    pub name: String,
    /// Member count
    pub listeners: usize,
    /// Current track name, if any
    pub current_song: Option<String>,
    pub is_playing: bool,
}

// === Handshake ===

/// Client introduction, first message on every connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloMessage {
    pub version: u8,
    pub name: String,
}

/// Server reply to HELLO; assigns the connection identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WelcomeMessage {
    pub version: u8,
    /// Session (connection) id; members and hosts are named by this
    pub session: String,
    /// Server display name
    pub server: String,
}

// === Requests ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStationMessage {
    /// Client-local correlation id, echoed in the ack
    pub request_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinStationMessage {
    pub request_id: u32,
    pub station_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveStationMessage {
    pub station_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerActionMessage {
    pub station_id: String,
    #[serde(flatten)]
    pub action: PlayerAction,
}

// === Acks ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAckMessage {
    pub request_id: u32,
    pub success: bool,
    pub station_id: String,
    pub station: Station,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinAckMessage {
    pub request_id: u32,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<Station>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// === Broadcasts ===

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsListMessage {
    pub stations: Vec<StationSummary>,
}

/// Full snapshot fan-out after an accepted player action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationUpdateMessage {
    #[serde(flatten)]
    pub action: PlayerAction,
    pub station: Station,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedMessage {
    pub user_id: String,
    /// Member count after the join
    pub count: usize,
    pub station: Station,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftMessage {
    pub user_id: String,
    /// Member count after the departure
    pub count: usize,
    pub station: Station,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostChangedMessage {
    pub new_host: String,
    pub station: Station,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub code: u16,
    pub message: String,
}

/// All messages exchanged between client and server.
///
/// Tagged with `type` on the wire, e.g.
/// `{"type":"join_station","request_id":1,"station_id":"..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // Handshake
    Hello(HelloMessage),
    Welcome(WelcomeMessage),

    // Client -> server
    GetStations,
    CreateStation(CreateStationMessage),
    JoinStation(JoinStationMessage),
    LeaveStation(LeaveStationMessage),
    PlayerAction(PlayerActionMessage),

    // Server -> client, direct responses
    CreateAck(CreateAckMessage),
    JoinAck(JoinAckMessage),
    Error(ErrorMessage),

    // Server -> client, fan-out
    StationsList(StationsListMessage),
    StationUpdate(StationUpdateMessage),
    UserJoined(UserJoinedMessage),
    UserLeft(UserLeftMessage),
    HostChanged(HostChangedMessage),

    // Liveness
    Ping,
    Pong,
}
