//! Test utilities and fixtures.
//!
//! [`FakeCodec`] stores a file's tags as JSON in the file itself, so
//! importer tests can lay out release directories without real audio.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{FakeCodec, fixtures};
//!
//! let dir = tempfile::tempdir().unwrap();
//! FakeCodec.create(&dir.path().join("01.flac"), &fixtures::local_tags("A", "B", "one", 1));
//! ```

use std::fs;
use std::path::Path;

use crate::metadata::{AudioProperties, TagCodec, TagError, Tags};

/// A [`TagCodec`] over JSON files
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeCodec;

impl FakeCodec {
    /// Write a fake audio file holding `tags`, creating parent dirs
    pub fn create(&self, path: &Path, tags: &Tags) {
        fs::create_dir_all(path.parent().expect("path has a parent")).expect("create parent dirs");
        fs::write(path, serde_json::to_vec(tags).expect("tags serialize")).expect("write fake file");
    }
}

impl TagCodec for FakeCodec {
    fn read_tags(&self, path: &Path) -> Result<Tags, TagError> {
        let data = fs::read(path).map_err(|e| TagError::read(path, e))?;
        if data.is_empty() {
            return Ok(Tags::new());
        }
        serde_json::from_slice(&data).map_err(|e| TagError::read(path, e))
    }

    fn write_tags(&self, path: &Path, tags: &Tags, clear_existing: bool) -> Result<(), TagError> {
        let mut merged = if clear_existing {
            Tags::new()
        } else {
            self.read_tags(path).map_err(|e| TagError::write(path, e))?
        };
        for (key, values) in tags.iter() {
            merged.set(key, values.iter().cloned());
        }
        let data = serde_json::to_vec(&merged).map_err(|e| TagError::write(path, e))?;
        fs::write(path, data).map_err(|e| TagError::write(path, e))
    }

    fn read_properties(&self, path: &Path) -> Result<AudioProperties, TagError> {
        fs::metadata(path).map_err(|e| TagError::read(path, e))?;
        Ok(AudioProperties::default())
    }
}

/// Domain fixtures
pub mod fixtures {
    use crate::enrichment::domain::{
        Artist, ArtistCredit, Medium, PartialDate, Recording, Release, ReleaseGroup, Track,
    };
    use crate::metadata::{Tags, keys};

    pub fn artist_credit(name: &str) -> ArtistCredit {
        ArtistCredit {
            name: name.to_string(),
            join_phrase: String::new(),
            artist: Artist {
                id: format!("artist-{}", name.to_lowercase().replace(' ', "-")),
                name: name.to_string(),
                sort_name: name.to_string(),
                ..Default::default()
            },
        }
    }

    /// A single-CD release where every track is by the release artist
    pub fn release_with_tracks(artist: &str, title: &str, track_titles: &[&str]) -> Release {
        let credit = artist_credit(artist);
        let tracks = track_titles
            .iter()
            .enumerate()
            .map(|(i, t)| Track {
                id: format!("track-{}", i + 1),
                title: t.to_string(),
                position: i as u32 + 1,
                artists: vec![credit.clone()],
                recording: Recording {
                    id: format!("recording-{}", i + 1),
                    title: t.to_string(),
                    ..Default::default()
                },
                ..Default::default()
            })
            .collect();

        Release {
            id: "b2a3e1c4-0000-4000-8000-000000000001".to_string(),
            title: title.to_string(),
            date: Some(PartialDate::year(2001)),
            artists: vec![credit.clone()],
            release_group: ReleaseGroup {
                id: "rg-1".to_string(),
                title: title.to_string(),
                primary_type: "Album".to_string(),
                first_release_date: Some(PartialDate::year(2001)),
                artists: vec![credit],
                ..Default::default()
            },
            media: vec![Medium {
                position: 1,
                format: "CD".to_string(),
                tracks,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// Tags a well-tagged local file of [`release_with_tracks`] would have
    pub fn local_tags(artist: &str, album: &str, title: &str, track_no: u32) -> Tags {
        let mut tags = Tags::new();
        tags.set(keys::ALBUM, [album]);
        tags.set(keys::ALBUM_ARTIST, [artist]);
        tags.set(keys::ARTIST, [artist]);
        tags.set(keys::TITLE, [title]);
        tags.set(keys::TRACK_NUMBER, [track_no.to_string()]);
        tags
    }
}
