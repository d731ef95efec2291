//! Authoritative station registry
//!
//! One entry per live station. The inner `Mutex` is the serialization
//! point: all mutations of a station take it, so read-modify-write is
//! atomic per station while different stations proceed concurrently.
//!
//! Invariant: a station exists iff its member set is non-empty. An
//! entry whose member set has just drained counts as destroyed even if
//! the map slot is still being reclaimed; `join` refuses it.

use airwave_core::{PlayerAction, Station, StationSummary};
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ServerError};
use crate::session::SessionId;

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Snapshot after the join
    pub station: Station,
    /// False on an idempotent re-join
    pub newly_joined: bool,
}

/// Result of a departure (leave or disconnect)
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    /// Snapshot after the removal; `None` when the station was destroyed
    pub station: Option<Station>,
    /// Host reassigned to this member
    pub new_host: Option<SessionId>,
    /// The departing member was the last one
    pub destroyed: bool,
    /// Members remaining
    pub remaining: usize,
}

/// Owns all station state; constructed at process start, dropped at
/// shutdown. No ambient globals.
pub struct StationRegistry {
    stations: DashMap<String, Mutex<Station>>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self {
            stations: DashMap::new(),
        }
    }

    /// Create a station; always succeeds. The creator becomes sole
    /// member and host.
    pub fn create(&self, name: &str, creator: &SessionId) -> Station {
        let id = Uuid::new_v4().to_string();
        let name = if name.trim().is_empty() {
            format!("Station {}", &id[..4])
        } else {
            name.to_string()
        };

        let station = Station::new(id.clone(), name, creator.clone());
        let snapshot = station.clone();
        self.stations.insert(id.clone(), Mutex::new(station));

        info!("station created: {} by {}", id, creator);
        snapshot
    }

    /// Add a member. Idempotent: re-joining returns the current
    /// snapshot without duplicating membership.
    pub fn join(&self, station_id: &str, member: &SessionId) -> Result<JoinOutcome> {
        let entry = self
            .stations
            .get(station_id)
            .ok_or_else(|| ServerError::StationNotFound(station_id.to_string()))?;
        let mut station = entry.lock();

        if station.members.is_empty() {
            // Drained concurrently; logically already destroyed.
            return Err(ServerError::StationNotFound(station_id.to_string()));
        }

        let newly_joined = station.add_member(member);
        if newly_joined {
            debug!("{} joined station {}", member, station_id);
        }

        Ok(JoinOutcome {
            station: station.clone(),
            newly_joined,
        })
    }

    /// Remove a member. `None` when the station or member is absent.
    /// Destroys the station the moment its member set becomes empty.
    pub fn leave(&self, station_id: &str, member: &SessionId) -> Option<LeaveOutcome> {
        let outcome = {
            let entry = self.stations.get(station_id)?;
            let mut station = entry.lock();
            let removed = station.remove_member(member)?;

            debug!("{} left station {}", member, station_id);

            LeaveOutcome {
                station: if removed.now_empty {
                    None
                } else {
                    Some(station.clone())
                },
                new_host: removed.new_host,
                destroyed: removed.now_empty,
                remaining: removed.remaining,
            }
        };

        if outcome.destroyed {
            // Re-check under the entry: a racing join may have revived it.
            let removed = self
                .stations
                .remove_if(station_id, |_, station| station.lock().members.is_empty());
            if removed.is_some() {
                info!("station destroyed (empty): {}", station_id);
            }
        }

        Some(outcome)
    }

    /// Apply a player action. Silent no-op (`None`) when the station is
    /// absent; any member may mutate, host is not privileged.
    pub fn apply(&self, station_id: &str, action: &PlayerAction) -> Option<Station> {
        let entry = self.stations.get(station_id)?;
        let mut station = entry.lock();
        if station.members.is_empty() {
            return None;
        }
        station.apply(action);
        Some(station.clone())
    }

    /// Disconnect cleanup: remove the member from every station it
    /// belonged to, using the same per-station serialization as
    /// ordinary mutations.
    pub fn remove_from_all(&self, member: &SessionId) -> Vec<(String, LeaveOutcome)> {
        let ids: Vec<String> = self.stations.iter().map(|e| e.key().clone()).collect();
        ids.into_iter()
            .filter_map(|id| self.leave(&id, member).map(|outcome| (id, outcome)))
            .collect()
    }

    /// Full recomputation of the public listing
    pub fn listing(&self) -> Vec<StationSummary> {
        self.stations
            .iter()
            .map(|entry| entry.value().lock().summary())
            .collect()
    }

    /// Current snapshot of one station
    pub fn snapshot(&self, station_id: &str) -> Option<Station> {
        self.stations
            .get(station_id)
            .map(|entry| entry.lock().clone())
    }

    pub fn contains(&self, station_id: &str) -> bool {
        self.stations.contains_key(station_id)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

impl Default for StationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_join_leave_lifecycle() {
        let registry = StationRegistry::new();
        let station = registry.create("Test FM", &"a".to_string());
        assert_eq!(registry.len(), 1);

        let joined = registry.join(&station.id, &"b".to_string()).unwrap();
        assert!(joined.newly_joined);
        assert_eq!(joined.station.members, vec!["a", "b"]);

        registry.leave(&station.id, &"a".to_string()).unwrap();
        let outcome = registry.leave(&station.id, &"b".to_string()).unwrap();
        assert!(outcome.destroyed);
        assert!(registry.is_empty());
    }

    #[test]
    fn join_unknown_station_errors() {
        let registry = StationRegistry::new();
        let err = registry.join("nope", &"a".to_string()).unwrap_err();
        assert!(matches!(err, ServerError::StationNotFound(_)));
    }

    #[test]
    fn leave_is_noop_when_absent() {
        let registry = StationRegistry::new();
        assert!(registry.leave("nope", &"a".to_string()).is_none());

        let station = registry.create("S", &"a".to_string());
        assert!(registry.leave(&station.id, &"ghost".to_string()).is_none());
        assert_eq!(registry.snapshot(&station.id).unwrap().members, vec!["a"]);
    }

    #[test]
    fn empty_creation_name_gets_a_fallback() {
        let registry = StationRegistry::new();
        let station = registry.create("  ", &"a".to_string());
        assert!(station.name.starts_with("Station "));
    }

    #[test]
    fn apply_on_missing_station_is_silent() {
        let registry = StationRegistry::new();
        assert!(registry.apply("nope", &PlayerAction::Pause).is_none());
    }
}
