//! Playback engine reconciliation
//!
//! The server's station snapshot is authoritative. The reconciler
//! diffs it against a local [`PlaybackEngine`] and issues the minimal
//! engine calls to converge: applying the same snapshot twice issues
//! nothing the second time.

use airwave_core::{Station, Track};
use tracing::debug;

use crate::catalog::Catalog;

/// Default drift tolerance in seconds before a corrective seek
pub const DEFAULT_DRIFT_THRESHOLD: f64 = 0.5;

/// Local playback engine the reconciler drives.
///
/// Implementations wrap whatever actually produces audio. `load` must
/// not start playback on its own.
pub trait PlaybackEngine {
    fn load(&mut self, track: &Track);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position: f64);
    fn position(&self) -> f64;
    fn is_playing(&self) -> bool;
}

/// Converges a [`PlaybackEngine`] onto station snapshots
pub struct Reconciler<E: PlaybackEngine> {
    engine: E,
    catalog: Catalog,
    /// Name of the track currently loaded into the engine
    loaded: Option<String>,
    /// Highest snapshot version applied so far
    last_version: u64,
    drift_threshold: f64,
}

impl<E: PlaybackEngine> Reconciler<E> {
    pub fn new(engine: E, catalog: Catalog) -> Self {
        Self {
            engine,
            catalog,
            loaded: None,
            last_version: 0,
            drift_threshold: DEFAULT_DRIFT_THRESHOLD,
        }
    }

    /// Override the drift tolerance (seconds)
    pub fn with_drift_threshold(mut self, threshold: f64) -> Self {
        self.drift_threshold = threshold;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn loaded_track(&self) -> Option<&str> {
        self.loaded.as_deref()
    }

    /// Converge the engine onto a snapshot.
    ///
    /// Snapshots older than one already applied are discarded; version
    /// counters only move forward. The snapshot's stored position is
    /// the last seek or pause point, not live playhead time, so a
    /// corrective seek only happens while paused.
    pub fn apply(&mut self, station: &Station) {
        if station.version < self.last_version {
            debug!(
                "Discarding stale snapshot v{} (have v{})",
                station.version, self.last_version
            );
            return;
        }
        self.last_version = station.version;

        // Track: load without autoplay, the play state step below
        // decides whether it runs
        if let Some(track) = &station.playback.current_track {
            if self.loaded.as_deref() != Some(track.name.as_str()) {
                if let Some(local) = self.catalog.find_by_name(&track.name) {
                    debug!("Loading {:?}", local.name);
                    self.engine.load(local);
                    self.loaded = Some(local.name.clone());
                } else {
                    debug!("Track {:?} not in catalog, skipping", track.name);
                }
            }
        }

        // Play state
        if station.playback.is_playing != self.engine.is_playing() {
            if station.playback.is_playing {
                self.engine.play();
            } else {
                self.engine.pause();
            }
        }

        // Position, only while paused
        if !station.playback.is_playing {
            let drift = (station.playback.position - self.engine.position()).abs();
            if drift > self.drift_threshold {
                debug!("Correcting position to {}", station.playback.position);
                self.engine.seek(station.playback.position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airwave_core::PlaybackState;

    #[derive(Debug, Default)]
    struct MockEngine {
        playing: bool,
        position: f64,
        loaded: Option<String>,
        calls: Vec<String>,
    }

    impl PlaybackEngine for MockEngine {
        fn load(&mut self, track: &Track) {
            self.loaded = Some(track.name.clone());
            self.calls.push(format!("load:{}", track.name));
        }
        fn play(&mut self) {
            self.playing = true;
            self.calls.push("play".to_string());
        }
        fn pause(&mut self) {
            self.playing = false;
            self.calls.push("pause".to_string());
        }
        fn seek(&mut self, position: f64) {
            self.position = position;
            self.calls.push(format!("seek:{}", position));
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
    }

    fn track(name: &str) -> Track {
        Track {
            name: name.to_string(),
            artist: "Artist".to_string(),
            cover_url: String::new(),
            audio_url: String::new(),
        }
    }

    fn station(version: u64, playback: PlaybackState) -> Station {
        let mut s = Station::new("st-1".to_string(), "Test".to_string(), "host".to_string());
        s.playback = playback;
        s.version = version;
        s
    }

    fn playback(track_name: Option<&str>, is_playing: bool, position: f64) -> PlaybackState {
        PlaybackState {
            current_track: track_name.map(track),
            is_playing,
            position,
            updated_at: 0,
        }
    }

    #[test]
    fn converges_then_goes_quiet() {
        let catalog = Catalog::new(vec![track("Alpha")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        let snap = station(3, playback(Some("Alpha"), true, 0.0));
        r.apply(&snap);
        assert_eq!(r.engine().calls, vec!["load:Alpha", "play"]);

        r.apply(&snap);
        assert_eq!(r.engine().calls.len(), 2, "second apply must be a no-op");
    }

    #[test]
    fn load_does_not_autoplay() {
        let catalog = Catalog::new(vec![track("Alpha")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        r.apply(&station(2, playback(Some("Alpha"), false, 0.0)));
        assert_eq!(r.engine().calls, vec!["load:Alpha"]);
        assert!(!r.engine().is_playing());
    }

    #[test]
    fn seeks_only_while_paused() {
        let catalog = Catalog::new(vec![track("Alpha")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        // Playing with large drift: no seek
        r.apply(&station(2, playback(Some("Alpha"), true, 60.0)));
        assert!(!r.engine().calls.iter().any(|c| c.starts_with("seek")));

        // Paused with the same drift: corrective seek
        r.apply(&station(3, playback(Some("Alpha"), false, 60.0)));
        assert!(r.engine().calls.contains(&"seek:60".to_string()));
        assert_eq!(r.engine().position(), 60.0);
    }

    #[test]
    fn drift_within_threshold_is_tolerated() {
        let catalog = Catalog::new(vec![track("Alpha")]);
        let mut engine = MockEngine::default();
        engine.position = 10.0;
        let mut r = Reconciler::new(engine, catalog);

        r.apply(&station(2, playback(Some("Alpha"), false, 10.4)));
        assert!(!r.engine().calls.iter().any(|c| c.starts_with("seek")));

        r.apply(&station(3, playback(Some("Alpha"), false, 14.0)));
        assert!(r.engine().calls.contains(&"seek:14".to_string()));
    }

    #[test]
    fn stale_snapshot_is_discarded() {
        let catalog = Catalog::new(vec![track("Alpha"), track("Beta")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        r.apply(&station(5, playback(Some("Beta"), true, 0.0)));
        let calls_after_first = r.engine().calls.len();

        // Older snapshot arriving late must not rewind playback
        r.apply(&station(4, playback(Some("Alpha"), false, 0.0)));
        assert_eq!(r.engine().calls.len(), calls_after_first);
        assert_eq!(r.loaded_track(), Some("Beta"));
    }

    #[test]
    fn unknown_track_skips_load_but_syncs_state() {
        let catalog = Catalog::new(vec![track("Alpha")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        r.apply(&station(2, playback(Some("Zeta"), true, 0.0)));
        assert_eq!(r.engine().calls, vec!["play"]);
        assert_eq!(r.loaded_track(), None);
    }

    #[test]
    fn song_change_reloads() {
        let catalog = Catalog::new(vec![track("Alpha"), track("Beta")]);
        let mut r = Reconciler::new(MockEngine::default(), catalog);

        r.apply(&station(2, playback(Some("Alpha"), true, 30.0)));
        r.apply(&station(3, playback(Some("Beta"), true, 0.0)));

        assert_eq!(r.loaded_track(), Some("Beta"));
        assert!(r.engine().calls.contains(&"load:Beta".to_string()));
        // Already playing, no second play call
        assert_eq!(
            r.engine().calls.iter().filter(|c| c.as_str() == "play").count(),
            1
        );
    }
}
