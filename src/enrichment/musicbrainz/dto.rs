//! MusicBrainz API Data Transfer Objects
//!
//! These types match what the MusicBrainz API returns for
//! `/release/{mbid}` with recordings, credits, labels, genres and aliases
//! included. DO NOT use these types outside the musicbrainz module - convert
//! to domain types.
//!
//! API Reference: https://musicbrainz.org/doc/MusicBrainz_API

use serde::Deserialize;

/// Release lookup response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseResponse {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub disambiguation: String,
    /// Barcode is `null` when unknown and `""` when the release has none
    pub barcode: Option<String>,
    /// YYYY, YYYY-MM, or YYYY-MM-DD
    pub date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    pub release_group: Option<ReleaseGroup>,
    #[serde(default)]
    pub label_info: Vec<LabelInfo>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub media: Vec<Medium>,
}

/// Artist credit (can be multiple for collaborations)
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistCredit {
    pub artist: Artist,
    /// How this artist is credited (may differ from official name)
    pub name: Option<String>,
    pub joinphrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    #[serde(default)]
    pub aliases: Vec<Alias>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alias {
    pub name: String,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub disambiguation: String,
    pub primary_type: Option<String>,
    #[serde(default)]
    pub secondary_types: Vec<String>,
    pub first_release_date: Option<String>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LabelInfo {
    pub label: Option<Label>,
    pub catalog_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

/// Medium (disc) within a release
#[derive(Debug, Clone, Deserialize)]
pub struct Medium {
    pub position: Option<u32>,
    pub title: Option<String>,
    /// Format (CD, Vinyl, Digital Media, ...)
    pub format: Option<String>,
    pub pregap: Option<Track>,
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Track on a medium
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Track {
    pub id: String,
    pub position: Option<u32>,
    /// Title as printed on this release (may differ from recording title)
    pub title: Option<String>,
    /// Length in milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    pub recording: Recording,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Recording {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub video: bool,
    #[serde(default)]
    pub genres: Vec<Genre>,
}

/// Search response; only the top hit's ID is used
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub releases: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub score: u32,
}

/// Error response from MusicBrainz API
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    pub error: String,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// ============================================================================

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_minimal_release() {
        let json = r#"{
            "id": "rel-123",
            "title": "Test Album"
        }"#;

        let release: ReleaseResponse =
            serde_json::from_str(json).expect("Should parse minimal release");

        assert_eq!(release.id, "rel-123");
        assert!(release.barcode.is_none());
        assert!(release.media.is_empty());
        assert!(release.release_group.is_none());
    }

    #[test]
    fn test_parse_release_with_media() {
        let json = r#"{
            "id": "rel-123",
            "title": "Test Album",
            "barcode": "",
            "date": "1975-10-31",
            "artist-credit": [{
                "artist": {
                    "id": "queen-id",
                    "name": "Queen",
                    "sort-name": "Queen",
                    "aliases": [{"name": "クイーン", "locale": "ja"}]
                },
                "name": "Queen",
                "joinphrase": ""
            }],
            "release-group": {
                "id": "rg-123",
                "title": "Test Album",
                "primary-type": "Album",
                "secondary-types": ["Live"],
                "first-release-date": "1975"
            },
            "label-info": [{
                "catalog-number": "EMTC 103",
                "label": {"id": "emi-id", "name": "EMI"}
            }, {
                "catalog-number": null,
                "label": null
            }],
            "media": [{
                "position": 1,
                "format": "CD",
                "title": "",
                "pregap": {
                    "id": "t0",
                    "position": 0,
                    "title": "Hidden",
                    "recording": {"id": "r0", "title": "Hidden", "video": false}
                },
                "tracks": [{
                    "id": "t1",
                    "position": 1,
                    "title": "Death on Two Legs",
                    "length": 223000,
                    "recording": {"id": "r1", "title": "Death on Two Legs"}
                }]
            }]
        }"#;

        let release: ReleaseResponse =
            serde_json::from_str(json).expect("Should parse full release");

        assert_eq!(release.barcode.as_deref(), Some(""));
        assert_eq!(release.artist_credit[0].artist.aliases[0].locale.as_deref(), Some("ja"));

        let rg = release.release_group.as_ref().unwrap();
        assert_eq!(rg.secondary_types, vec!["Live"]);

        assert_eq!(release.label_info.len(), 2);
        assert!(release.label_info[1].label.is_none());

        let medium = &release.media[0];
        assert_eq!(medium.pregap.as_ref().unwrap().position, Some(0));
        assert_eq!(medium.tracks[0].length, Some(223000));
        assert!(!medium.tracks[0].recording.video);
    }

    #[test]
    fn test_parse_search_response() {
        let json = r#"{
            "created": "2024-01-01T00:00:00.000Z",
            "count": 1,
            "offset": 0,
            "releases": [{"id": "rel-1", "score": 100, "title": "Whatever"}]
        }"#;

        let response: SearchResponse = serde_json::from_str(json).expect("Should parse search");
        assert_eq!(response.releases[0].id, "rel-1");
        assert_eq!(response.releases[0].score, 100);
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{
            "error": "Not Found",
            "help": "For usage, please see: https://musicbrainz.org/doc/MusicBrainz_API"
        }"#;

        let error: ApiError = serde_json::from_str(json).expect("Should parse error");
        assert_eq!(error.error, "Not Found");
    }
}
