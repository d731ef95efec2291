//! Station registry behavior under churn

use airwave_core::{PlayerAction, Track};
use airwave_server::StationRegistry;
use std::sync::Arc;

fn track(name: &str) -> Track {
    Track {
        name: name.to_string(),
        artist: "Artist".to_string(),
        cover_url: String::new(),
        audio_url: String::new(),
    }
}

/// Small deterministic PRNG, no external crates needed in tests
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

#[test]
fn host_succession_follows_join_order() {
    let registry = StationRegistry::new();
    let station = registry.create("Late Night", &"a".to_string());

    registry.join(&station.id, &"b".to_string()).unwrap();
    registry.join(&station.id, &"c".to_string()).unwrap();

    // Host leaves: second joiner takes over
    let outcome = registry.leave(&station.id, &"a".to_string()).unwrap();
    assert_eq!(outcome.new_host.as_deref(), Some("b"));
    assert_eq!(outcome.remaining, 2);

    // Host leaves again: third joiner takes over
    let outcome = registry.leave(&station.id, &"b".to_string()).unwrap();
    assert_eq!(outcome.new_host.as_deref(), Some("c"));

    // Non-host departures never reassign
    registry.join(&station.id, &"d".to_string()).unwrap();
    let outcome = registry.leave(&station.id, &"d".to_string()).unwrap();
    assert!(outcome.new_host.is_none());
}

#[test]
fn destroyed_station_disappears_from_listing() {
    let registry = StationRegistry::new();
    let keep = registry.create("Keep", &"a".to_string());
    let gone = registry.create("Gone", &"b".to_string());

    let outcome = registry.leave(&gone.id, &"b".to_string()).unwrap();
    assert!(outcome.destroyed);
    assert!(!registry.contains(&gone.id));

    let listing = registry.listing();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].id, keep.id);

    // Joining the destroyed station now fails
    assert!(registry.join(&gone.id, &"c".to_string()).is_err());
}

#[test]
fn actions_mutate_only_live_stations() {
    let registry = StationRegistry::new();
    let station = registry.create("Live", &"a".to_string());

    let snap = registry
        .apply(&station.id, &PlayerAction::ChangeSong { track: track("One") })
        .unwrap();
    assert!(snap.playback.is_playing);
    assert_eq!(snap.playback.position, 0.0);

    registry.leave(&station.id, &"a".to_string());
    assert!(registry
        .apply(&station.id, &PlayerAction::Pause)
        .is_none());
}

/// A station exists exactly while it has members, no matter the order
/// of joins and leaves.
#[test]
fn randomized_churn_keeps_existence_tied_to_membership() {
    let registry = StationRegistry::new();
    let station = registry.create("Churn", &"m0".to_string());
    let mut rng = XorShift(0x5eed_1234_dead_beef);
    let mut present: Vec<bool> = vec![true, false, false, false, false];

    for _ in 0..500 {
        let member = (rng.next() % 5) as usize;
        let id = format!("m{}", member);

        if rng.next() % 2 == 0 {
            match registry.join(&station.id, &id) {
                Ok(outcome) => {
                    assert_eq!(outcome.newly_joined, !present[member]);
                    present[member] = true;
                }
                Err(_) => {
                    // Station was destroyed by the last leave; recreate
                    // the world and keep churning
                    assert!(present.iter().all(|p| !p));
                    return;
                }
            }
        } else {
            let outcome = registry.leave(&station.id, &id);
            assert_eq!(outcome.is_some(), present[member]);
            present[member] = false;
            if let Some(outcome) = outcome {
                assert_eq!(
                    outcome.destroyed,
                    present.iter().all(|p| !p),
                    "destroy exactly when the last member leaves"
                );
            }
        }

        let member_count = present.iter().filter(|p| **p).count();
        assert_eq!(registry.contains(&station.id), member_count > 0);
        if let Some(snap) = registry.snapshot(&station.id) {
            assert_eq!(snap.listener_count(), member_count);
            assert!(snap.is_member(&snap.host), "host must be a member");
        }
    }
}

#[test]
fn concurrent_join_leave_never_panics() {
    let registry = Arc::new(StationRegistry::new());
    let station = registry.create("Stress", &"keeper".to_string());
    let station_id = station.id.clone();

    let mut handles = Vec::new();
    for worker in 0..8 {
        let registry = Arc::clone(&registry);
        let station_id = station_id.clone();
        handles.push(std::thread::spawn(move || {
            let id = format!("w{}", worker);
            for _ in 0..200 {
                let _ = registry.join(&station_id, &id);
                let _ = registry.apply(&station_id, &PlayerAction::Pause);
                let _ = registry.leave(&station_id, &id);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // The keeper never left, so the station survived the churn
    let snap = registry.snapshot(&station_id).unwrap();
    assert!(snap.is_member("keeper"));
    assert_eq!(snap.listener_count(), 1);
}
