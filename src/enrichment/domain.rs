//! Internal domain models for releases fetched from the metadata database.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All external API responses get converted into these types via adapters.
//! A `Release` is immutable once fetched for a given import.

use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;

/// MusicBrainz ID of the "Various Artists" special purpose artist
pub const VARIOUS_ARTISTS_ID: &str = "89ad4ac3-39f7-470e-963a-56509c546377";

/// Medium formats that carry video rather than audio. Tracks on these are
/// never matched against local files.
const VIDEO_FORMATS: &[&str] = &["DVD", "Blu-ray", "VHS", "VCD", "UMD"];

/// A canonical release (specific pressing/edition of an album)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Release {
    pub id: String,
    pub title: String,
    pub disambiguation: String,
    pub barcode: String,
    pub date: Option<PartialDate>,
    pub artists: Vec<ArtistCredit>,
    pub release_group: ReleaseGroup,
    pub label_info: Vec<LabelInfo>,
    pub genres: Vec<Genre>,
    pub media: Vec<Medium>,
}

/// Release group (groups the same album across editions)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    pub disambiguation: String,
    /// Primary type (Album, Single, EP, ...)
    pub primary_type: String,
    /// Secondary types (Compilation, Live, Soundtrack, ...)
    pub secondary_types: Vec<String>,
    pub first_release_date: Option<PartialDate>,
    pub artists: Vec<ArtistCredit>,
    pub genres: Vec<Genre>,
}

/// A disc (or other medium) within a release
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Medium {
    /// Position as reported by the source. Not used for numbering; see [`Release::flat_tracks`].
    pub position: u32,
    pub title: String,
    /// Format (CD, Vinyl, Digital Media, DVD-Video, ...)
    pub format: String,
    /// Hidden track before position 1, if any
    pub pregap: Option<Track>,
    pub tracks: Vec<Track>,
}

/// A track on a medium
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Track {
    pub id: String,
    pub title: String,
    /// 1-based position on its medium; 0 for a pregap track
    pub position: u32,
    pub length: Option<Duration>,
    pub artists: Vec<ArtistCredit>,
    pub recording: Recording,
    /// Derived by [`Release::flat_tracks`], renumbered 1..N after filtering
    pub disc_number: u32,
    pub disc_title: String,
    pub disc_format: String,
}

/// The recording behind a track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recording {
    pub id: String,
    pub title: String,
    pub video: bool,
    pub genres: Vec<Genre>,
}

/// One entry of an artist credit list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtistCredit {
    /// How the artist is credited on this release
    pub name: String,
    /// Join phrase (e.g., " & ", " feat. ")
    pub join_phrase: String,
    pub artist: Artist,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artist {
    pub id: String,
    pub name: String,
    /// Sort name (e.g., "Beatles, The")
    pub sort_name: String,
    pub aliases: Vec<Alias>,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Alias {
    pub name: String,
    pub locale: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabelInfo {
    pub label: Label,
    pub catalog_number: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Label {
    pub id: String,
    pub name: String,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Genre {
    pub id: String,
    pub name: String,
    pub count: u32,
}

/// A date with optional month and day, as MusicBrainz reports them
/// ("2019", "2019-05", "2019-05-03").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartialDate {
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

impl PartialDate {
    pub fn year(year: i32) -> Self {
        Self {
            year,
            month: None,
            day: None,
        }
    }

    /// Parse "YYYY", "YYYY-MM" or "YYYY-MM-DD". Anything after the first ten
    /// characters (e.g. a time component) is ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut parts = s.get(..s.len().min(10))?.splitn(3, '-');
        let year: i32 = parts.next()?.trim().parse().ok()?;
        let month: Option<u32> = match parts.next() {
            Some(m) => Some(m.parse().ok()?),
            None => None,
        };
        let day: Option<u32> = match parts.next() {
            Some(d) => Some(d.parse().ok()?),
            None => None,
        };

        // validate against a real calendar
        NaiveDate::from_ymd_opt(year, month.unwrap_or(1), day.unwrap_or(1))?;
        Some(Self { year, month, day })
    }
}

impl fmt::Display for PartialDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.year)?;
        if let Some(month) = self.month {
            write!(f, "-{:02}", month)?;
            if let Some(day) = self.day {
                write!(f, "-{:02}", day)?;
            }
        }
        Ok(())
    }
}

impl Medium {
    /// Whether this medium carries video and should be skipped entirely
    pub fn is_video(&self) -> bool {
        VIDEO_FORMATS.iter().any(|f| self.format.contains(f))
    }
}

impl Release {
    /// Media that take part in matching (video formats filtered out)
    pub fn audio_media(&self) -> impl Iterator<Item = &Medium> {
        self.media.iter().filter(|m| !m.is_video())
    }

    /// The ordered concatenation of all non-video tracks across all discs,
    /// pregap tracks included. Disc number, title and format are stamped
    /// onto every track, with discs renumbered contiguously from 1.
    pub fn flat_tracks(&self) -> Vec<Track> {
        let mut tracks = Vec::new();
        for (i, medium) in self.audio_media().enumerate() {
            let disc_number = i as u32 + 1;
            let stamp = |track: &Track| Track {
                disc_number,
                disc_title: medium.title.clone(),
                disc_format: medium.format.clone(),
                ..track.clone()
            };

            if let Some(ref pregap) = medium.pregap {
                tracks.push(stamp(pregap));
            }
            for track in &medium.tracks {
                if track.recording.video {
                    continue;
                }
                tracks.push(stamp(track));
            }
        }
        tracks
    }

    /// Number of discs left after video media are filtered out
    pub fn total_discs(&self) -> u32 {
        self.audio_media().count() as u32
    }

    /// Format of the first medium, used for scoring and tagging
    pub fn media_format(&self) -> &str {
        self.media.first().map(|m| m.format.as_str()).unwrap_or("")
    }

    pub fn is_compilation(&self) -> bool {
        self.release_group.is_compilation()
    }

    /// First label entry, or an empty one
    pub fn label_info(&self) -> LabelInfo {
        self.label_info.first().cloned().unwrap_or_default()
    }

    /// Release-group and release disambiguation, comma-joined, empties dropped
    pub fn disambiguation_text(&self) -> String {
        [
            self.release_group.disambiguation.as_str(),
            self.disambiguation.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }

    /// Genres from the release, its group, recordings and artists. Falls
    /// back to label genres when none of those have any.
    pub fn genres(&self) -> Vec<Genre> {
        let mut genres: Vec<Genre> = Vec::new();
        genres.extend(self.genres.iter().cloned());
        genres.extend(self.release_group.genres.iter().cloned());
        for track in self.flat_tracks() {
            genres.extend(track.recording.genres);
        }
        for credit in self.artists.iter().chain(&self.release_group.artists) {
            genres.extend(credit.artist.genres.iter().cloned());
        }

        if genres.is_empty() {
            for info in &self.label_info {
                genres.extend(info.label.genres.iter().cloned());
            }
        }

        merge_genres(genres)
    }
}

impl ReleaseGroup {
    /// A compilation either by secondary type or by a Various Artists credit
    pub fn is_compilation(&self) -> bool {
        self.secondary_types.iter().any(|t| t == "Compilation")
            || self
                .artists
                .iter()
                .any(|c| c.artist.id == VARIOUS_ARTISTS_ID)
    }
}

/// Deduplicate genres by ID, summing counts, sorted by count then name
fn merge_genres(genres: Vec<Genre>) -> Vec<Genre> {
    let mut merged: Vec<Genre> = Vec::new();
    for genre in genres {
        match merged.iter_mut().find(|g| g.id == genre.id) {
            Some(existing) => existing.count += genre.count,
            None => merged.push(genre),
        }
    }
    merged.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    merged
}

// ============================================================================
// Artist credit helpers
// ============================================================================

/// Canonical artist names
pub fn artists_names(credits: &[ArtistCredit]) -> Vec<String> {
    credits.iter().map(|c| c.artist.name.clone()).collect()
}

/// Canonical artist names joined with their join phrases
pub fn artists_string(credits: &[ArtistCredit]) -> String {
    join_credits(credits, |c| &c.artist.name)
}

/// Names as credited on the release
pub fn artists_credit_names(credits: &[ArtistCredit]) -> Vec<String> {
    credits.iter().map(|c| c.name.clone()).collect()
}

pub fn artists_credit_string(credits: &[ArtistCredit]) -> String {
    join_credits(credits, |c| &c.name)
}

pub fn artists_sort_names(credits: &[ArtistCredit]) -> Vec<String> {
    credits.iter().map(|c| c.artist.sort_name.clone()).collect()
}

pub fn artists_sort_string(credits: &[ArtistCredit]) -> String {
    join_credits(credits, |c| &c.artist.sort_name)
}

/// Names preferring an English alias when the artist has one
pub fn artists_en_names(credits: &[ArtistCredit]) -> Vec<String> {
    credits
        .iter()
        .map(|c| english_name(&c.artist).to_string())
        .collect()
}

pub fn artists_en_string(credits: &[ArtistCredit]) -> String {
    join_credits(credits, |c| english_name(&c.artist))
}

fn english_name(artist: &Artist) -> &str {
    artist
        .aliases
        .iter()
        .find(|a| a.locale == "en")
        .map(|a| a.name.as_str())
        .unwrap_or(&artist.name)
}

fn join_credits<'a>(credits: &'a [ArtistCredit], name: impl Fn(&'a ArtistCredit) -> &'a str) -> String {
    let mut out = String::new();
    for credit in credits {
        out.push_str(name(credit));
        out.push_str(&credit.join_phrase);
    }
    out
}

/// Errors that can occur while talking to the metadata collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnrichmentError {
    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No matching release found")]
    NoMatches,

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Request cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credit(name: &str, join: &str) -> ArtistCredit {
        ArtistCredit {
            name: format!("{} (credited)", name),
            join_phrase: join.to_string(),
            artist: Artist {
                name: name.to_string(),
                sort_name: format!("{}, sort", name),
                ..Default::default()
            },
        }
    }

    fn track(title: &str, position: u32) -> Track {
        Track {
            title: title.to_string(),
            position,
            ..Default::default()
        }
    }

    #[test]
    fn test_partial_date_parse_and_display() {
        assert_eq!(PartialDate::parse("2019").unwrap().to_string(), "2019");
        assert_eq!(PartialDate::parse("2019-05").unwrap().to_string(), "2019-05");
        assert_eq!(
            PartialDate::parse("2019-05-03").unwrap().to_string(),
            "2019-05-03"
        );
        assert_eq!(
            PartialDate::parse("2019-05-03T10:00:00Z").unwrap().to_string(),
            "2019-05-03"
        );
        assert!(PartialDate::parse("").is_none());
        assert!(PartialDate::parse("2019-13-01").is_none());
        assert!(PartialDate::parse("soon").is_none());
    }

    #[test]
    fn test_artist_strings() {
        let credits = vec![credit("Queen", " & "), credit("David Bowie", "")];
        assert_eq!(artists_string(&credits), "Queen & David Bowie");
        assert_eq!(
            artists_credit_string(&credits),
            "Queen (credited) & David Bowie (credited)"
        );
        assert_eq!(artists_names(&credits), vec!["Queen", "David Bowie"]);
        assert_eq!(
            artists_sort_string(&credits),
            "Queen, sort & David Bowie, sort"
        );
    }

    #[test]
    fn test_english_alias_preferred() {
        let mut c = credit("坂本龍一", "");
        c.artist.aliases.push(Alias {
            name: "Ryuichi Sakamoto".to_string(),
            locale: "en".to_string(),
        });
        assert_eq!(artists_en_string(&[c.clone()]), "Ryuichi Sakamoto");
        assert_eq!(artists_string(&[c]), "坂本龍一");
    }

    #[test]
    fn test_flat_tracks_filters_video_and_renumbers_discs() {
        let release = Release {
            media: vec![
                Medium {
                    format: "DVD-Video".to_string(),
                    title: "Bonus DVD".to_string(),
                    tracks: vec![track("Video 1", 1)],
                    ..Default::default()
                },
                Medium {
                    format: "CD".to_string(),
                    title: "Main".to_string(),
                    pregap: Some(track("Hidden", 0)),
                    tracks: vec![track("One", 1), track("Two", 2)],
                    ..Default::default()
                },
                Medium {
                    format: "CD".to_string(),
                    tracks: vec![
                        track("Three", 1),
                        Track {
                            recording: Recording {
                                video: true,
                                ..Default::default()
                            },
                            ..track("Music Video", 2)
                        },
                    ],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let tracks = release.flat_tracks();
        let titles: Vec<&str> = tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Hidden", "One", "Two", "Three"]);
        assert_eq!(tracks[0].disc_number, 1);
        assert_eq!(tracks[0].disc_title, "Main");
        assert_eq!(tracks[3].disc_number, 2);
        assert_eq!(tracks[3].disc_format, "CD");
        assert_eq!(release.total_discs(), 2);
    }

    #[test]
    fn test_is_compilation() {
        let mut rg = ReleaseGroup::default();
        assert!(!rg.is_compilation());

        rg.secondary_types.push("Compilation".to_string());
        assert!(rg.is_compilation());

        let rg = ReleaseGroup {
            artists: vec![ArtistCredit {
                artist: Artist {
                    id: VARIOUS_ARTISTS_ID.to_string(),
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(rg.is_compilation());
    }

    #[test]
    fn test_disambiguation_text() {
        let mut release = Release::default();
        assert_eq!(release.disambiguation_text(), "");

        release.disambiguation = "remaster".to_string();
        assert_eq!(release.disambiguation_text(), "remaster");

        release.release_group.disambiguation = "Deluxe".to_string();
        assert_eq!(release.disambiguation_text(), "Deluxe, remaster");
    }

    #[test]
    fn test_genres_merged_and_sorted() {
        let genre = |id: &str, count| Genre {
            id: id.to_string(),
            name: id.to_string(),
            count,
        };
        let release = Release {
            genres: vec![genre("rock", 2), genre("jazz", 5)],
            release_group: ReleaseGroup {
                genres: vec![genre("rock", 4)],
                ..Default::default()
            },
            ..Default::default()
        };

        let genres = release.genres();
        assert_eq!(genres[0].id, "rock");
        assert_eq!(genres[0].count, 6);
        assert_eq!(genres[1].id, "jazz");
    }

    #[test]
    fn test_genres_fall_back_to_label() {
        let release = Release {
            label_info: vec![LabelInfo {
                label: Label {
                    genres: vec![Genre {
                        id: "techno".to_string(),
                        name: "techno".to_string(),
                        count: 1,
                    }],
                    ..Default::default()
                },
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(release.genres()[0].name, "techno");
    }
}
