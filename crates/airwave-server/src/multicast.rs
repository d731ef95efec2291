//! Per-station multicast topics
//!
//! Explicit fan-out groups: joining a station subscribes the session to
//! that station's topic and yields a [`TopicSubscription`] handle.
//! Delivery is best-effort, at-most-once; the topic only answers "who
//! gets this snapshot", transport does the rest.

use dashmap::DashMap;

use crate::session::SessionId;

/// Handle for one session's membership in one topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSubscription {
    pub station_id: String,
    pub session_id: SessionId,
}

/// Station-id keyed fan-out groups
pub struct Multicast {
    topics: DashMap<String, Vec<SessionId>>,
}

impl Multicast {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    /// Subscribe a session to a station's topic
    pub fn subscribe(&self, station_id: &str, session_id: &SessionId) -> TopicSubscription {
        let mut members = self
            .topics
            .entry(station_id.to_string())
            .or_insert_with(Vec::new);
        if !members.iter().any(|m| m == session_id) {
            members.push(session_id.clone());
        }

        TopicSubscription {
            station_id: station_id.to_string(),
            session_id: session_id.clone(),
        }
    }

    /// Drop one subscription; removes the topic when it empties
    pub fn unsubscribe(&self, subscription: &TopicSubscription) {
        if let Some(mut members) = self.topics.get_mut(&subscription.station_id) {
            members.retain(|m| m != &subscription.session_id);
        }
        self.topics
            .remove_if(&subscription.station_id, |_, members| members.is_empty());
    }

    /// Remove a destroyed station's topic outright
    pub fn drop_topic(&self, station_id: &str) {
        self.topics.remove(station_id);
    }

    /// Sessions currently subscribed to a station
    pub fn members(&self, station_id: &str) -> Vec<SessionId> {
        self.topics
            .get(station_id)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Remove a disconnecting session from every topic it was in
    pub fn remove_session(&self, session_id: &SessionId) {
        let station_ids: Vec<String> = self.topics.iter().map(|e| e.key().clone()).collect();
        for station_id in station_ids {
            if let Some(mut members) = self.topics.get_mut(&station_id) {
                members.retain(|m| m != session_id);
            }
            self.topics.remove_if(&station_id, |_, members| members.is_empty());
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl Default for Multicast {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_and_fan_out_membership() {
        let multicast = Multicast::new();
        let a = multicast.subscribe("s1", &"a".to_string());
        let _b = multicast.subscribe("s1", &"b".to_string());
        multicast.subscribe("s2", &"c".to_string());

        assert_eq!(multicast.members("s1"), vec!["a", "b"]);
        assert_eq!(multicast.members("s2"), vec!["c"]);

        multicast.unsubscribe(&a);
        assert_eq!(multicast.members("s1"), vec!["b"]);
    }

    #[test]
    fn duplicate_subscribe_is_idempotent() {
        let multicast = Multicast::new();
        multicast.subscribe("s1", &"a".to_string());
        multicast.subscribe("s1", &"a".to_string());
        assert_eq!(multicast.members("s1"), vec!["a"]);
    }

    #[test]
    fn empty_topics_are_reclaimed() {
        let multicast = Multicast::new();
        let a = multicast.subscribe("s1", &"a".to_string());
        multicast.unsubscribe(&a);
        assert!(multicast.is_empty());
    }

    #[test]
    fn disconnect_sweeps_all_topics() {
        let multicast = Multicast::new();
        multicast.subscribe("s1", &"a".to_string());
        multicast.subscribe("s2", &"a".to_string());
        multicast.subscribe("s2", &"b".to_string());

        multicast.remove_session(&"a".to_string());
        assert_eq!(multicast.members("s1"), Vec::<String>::new());
        assert_eq!(multicast.members("s2"), vec!["b"]);
        assert_eq!(multicast.len(), 1);
    }
}
