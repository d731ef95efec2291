//! Local track catalog
//!
//! Station snapshots name tracks; playback needs a local copy. The
//! catalog is the client's library, matched against snapshots by track
//! name.

use airwave_core::Track;

/// An ordered track library
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: Vec<Track>,
}

impl Catalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    /// Parse a catalog from a JSON array of tracks, the shape a song
    /// index endpoint serves
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Look a track up by name
    pub fn find_by_name(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.name == name)
    }

    /// Track after `name` in catalog order, wrapping at the end
    pub fn next_after(&self, name: &str) -> Option<&Track> {
        let index = self.tracks.iter().position(|t| t.name == name)?;
        self.tracks.get((index + 1) % self.tracks.len())
    }

    /// Track before `name` in catalog order, wrapping at the start
    pub fn previous_before(&self, name: &str) -> Option<&Track> {
        let index = self.tracks.iter().position(|t| t.name == name)?;
        let previous = (index + self.tracks.len() - 1) % self.tracks.len();
        self.tracks.get(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(name: &str) -> Track {
        Track {
            name: name.to_string(),
            artist: "Test Artist".to_string(),
            cover_url: String::new(),
            audio_url: String::new(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![track("Alpha"), track("Beta"), track("Gamma")])
    }

    #[test]
    fn find_by_name_matches_exactly() {
        let c = catalog();
        assert_eq!(c.find_by_name("Beta").unwrap().name, "Beta");
        assert!(c.find_by_name("beta").is_none());
    }

    #[test]
    fn next_and_previous_wrap() {
        let c = catalog();
        assert_eq!(c.next_after("Gamma").unwrap().name, "Alpha");
        assert_eq!(c.previous_before("Alpha").unwrap().name, "Gamma");
        assert_eq!(c.next_after("Alpha").unwrap().name, "Beta");
    }

    #[test]
    fn unknown_name_has_no_neighbors() {
        let c = catalog();
        assert!(c.next_after("Delta").is_none());
    }

    #[test]
    fn parses_the_song_index_shape() {
        let json = r#"[
            {"name": "Alpha", "artist": "A", "cover_url": "c.jpg", "audio_url": "a.mp3"}
        ]"#;
        let c = Catalog::from_json(json).unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.tracks()[0].artist, "A");
    }
}
