//! Station state-machine tests
//!
//! Covers the action effect table and host succession against
//! randomized membership churn.

use airwave_core::{PlayerAction, Station, Track};

fn track(name: &str) -> Track {
    Track {
        name: name.to_string(),
        artist: "Artist".to_string(),
        cover_url: format!("/covers/{name}.jpg"),
        audio_url: format!("/audio/{name}.mp3"),
    }
}

#[test]
fn change_song_resets_playback_regardless_of_prior_state() {
    let mut station = Station::new("s".into(), "S".into(), "a".into());

    // Establish a non-trivial prior state: track A, paused at 120s.
    station.apply(&PlayerAction::ChangeSong { track: track("A") });
    station.apply(&PlayerAction::Seek { time: 120.0 });
    station.apply(&PlayerAction::Pause);
    assert!(!station.playback.is_playing);
    assert_eq!(station.playback.position, 120.0);

    station.apply(&PlayerAction::ChangeSong { track: track("B") });
    assert_eq!(station.playback.current_track.as_ref().unwrap().name, "B");
    assert!(station.playback.is_playing);
    assert_eq!(station.playback.position, 0.0);
}

#[test]
fn pause_only_touches_the_flag() {
    let mut station = Station::new("s".into(), "S".into(), "a".into());
    station.apply(&PlayerAction::ChangeSong { track: track("A") });
    station.apply(&PlayerAction::Seek { time: 47.5 });

    station.apply(&PlayerAction::Pause);
    assert!(!station.playback.is_playing);
    assert_eq!(station.playback.position, 47.5);
    assert_eq!(station.playback.current_track.as_ref().unwrap().name, "A");
}

#[test]
fn play_with_track_replaces_without_resetting_position() {
    let mut station = Station::new("s".into(), "S".into(), "a".into());
    station.apply(&PlayerAction::Seek { time: 30.0 });
    station.apply(&PlayerAction::Play {
        track: Some(track("A")),
    });
    assert!(station.playback.is_playing);
    assert_eq!(station.playback.current_track.as_ref().unwrap().name, "A");
    assert_eq!(station.playback.position, 30.0);
}

// Tiny deterministic generator; enough churn without pulling in a
// dependency for one test.
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
fn host_is_always_a_member_under_random_churn() {
    let mut rng = XorShift(0x5EED_CAFE);
    let pool: Vec<String> = (0..8).map(|i| format!("conn-{i}")).collect();

    for round in 0..200 {
        let mut station = Station::new("s".into(), "S".into(), pool[0].clone());
        let mut alive = true;

        for _ in 0..64 {
            let member = &pool[(rng.next() % pool.len() as u64) as usize];
            if rng.next() % 2 == 0 {
                station.add_member(member);
            } else if let Some(removed) = station.remove_member(member) {
                if removed.now_empty {
                    // Registry destroys the station here; state beyond
                    // this point is unobservable.
                    alive = false;
                    break;
                }
                if let Some(new_host) = &removed.new_host {
                    assert!(
                        station.is_member(new_host),
                        "round {round}: successor not a member"
                    );
                }
            }
            assert!(
                station.is_member(&station.host),
                "round {round}: host left the member set"
            );
        }

        if alive {
            assert!(!station.members.is_empty());
            assert!(station.is_member(&station.host));
        }
    }
}
