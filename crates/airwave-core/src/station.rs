//! Station state and lifecycle
//!
//! A [`Station`] is the authoritative record for one shared playback
//! session. Members are kept in join order; the first remaining member
//! inherits the host role when the host departs. Every accepted
//! mutation bumps the `version` counter so reconcilers can discard
//! snapshots that arrive out of order.

use serde::{Deserialize, Serialize};

use crate::time;
use crate::types::{PlayerAction, StationSummary, Track};

/// Logical playback state of a station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// Last known position in seconds; non-negative, never clamped to
    /// track duration (that is the client's concern)
    pub position: f64,
    /// Wall-clock ms of the last playback mutation
    pub updated_at: u64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_track: None,
            is_playing: false,
            position: 0.0,
            updated_at: 0,
        }
    }
}

/// Result of removing a member, for the caller to turn into fan-outs
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRemoved {
    /// Set when the departing member was host and a successor exists
    pub new_host: Option<String>,
    /// The member set became empty; the station must be destroyed
    pub now_empty: bool,
    /// Members remaining after the removal
    pub remaining: usize,
}

/// One shared playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Connection ids in join order; order defines host succession
    pub members: Vec<String>,
    /// Always an element of `members` while the station exists
    pub host: String,
    pub playback: PlaybackState,
    /// Bumped on every accepted mutation (membership or playback)
    pub version: u64,
}

impl Station {
    /// Create a station with the creator as sole member and host
    pub fn new(id: String, name: String, creator: String) -> Self {
        Self {
            id,
            name,
            members: vec![creator.clone()],
            host: creator,
            playback: PlaybackState::default(),
            version: 1,
        }
    }

    pub fn is_member(&self, session_id: &str) -> bool {
        self.members.iter().any(|m| m == session_id)
    }

    pub fn listener_count(&self) -> usize {
        self.members.len()
    }

    /// Add a member; returns false on an idempotent re-join
    pub fn add_member(&mut self, session_id: &str) -> bool {
        if self.is_member(session_id) {
            return false;
        }
        self.members.push(session_id.to_string());
        self.version += 1;
        true
    }

    /// Remove a member, reassigning the host to the earliest-remaining
    /// member when needed. Returns `None` if the member was not present.
    pub fn remove_member(&mut self, session_id: &str) -> Option<MemberRemoved> {
        let idx = self.members.iter().position(|m| m == session_id)?;
        self.members.remove(idx);
        self.version += 1;

        let mut new_host = None;
        if self.host == session_id {
            if let Some(successor) = self.members.first() {
                self.host = successor.clone();
                new_host = Some(self.host.clone());
            }
        }

        Some(MemberRemoved {
            new_host,
            now_empty: self.members.is_empty(),
            remaining: self.members.len(),
        })
    }

    /// Apply a player action to the playback state
    pub fn apply(&mut self, action: &PlayerAction) {
        match action {
            PlayerAction::Play { track } => {
                self.playback.is_playing = true;
                if let Some(track) = track {
                    self.playback.current_track = Some(track.clone());
                }
            }
            PlayerAction::Pause => {
                self.playback.is_playing = false;
            }
            PlayerAction::Seek { time } => {
                self.playback.position = time.max(0.0);
            }
            PlayerAction::ChangeSong { track } => {
                self.playback.current_track = Some(track.clone());
                self.playback.is_playing = true;
                self.playback.position = 0.0;
            }
        }
        self.playback.updated_at = time::now_ms();
        self.version += 1;
    }

    /// Redacted view for the public listing
    pub fn summary(&self) -> StationSummary {
        StationSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            listeners: self.members.len(),
            current_song: self
                .playback
                .current_track
                .as_ref()
                .map(|t| t.name.clone()),
            is_playing: self.playback.is_playing,
        }
    }
}
