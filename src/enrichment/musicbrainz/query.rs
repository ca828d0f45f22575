//! Lucene query building for the release search endpoint
//!
//! See: https://musicbrainz.org/doc/MusicBrainz_API/Search#Release

use crate::enrichment::domain::PartialDate;

/// Search terms gathered from local tags (and an optional origin file)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReleaseQuery {
    pub release_id: String,
    pub artist_id: String,
    pub release_group_id: String,

    pub release: String,
    pub artist: String,
    pub date: Option<PartialDate>,
    pub format: String,
    pub label: String,
    pub catalog_num: String,
    pub barcode: String,
    pub num_tracks: usize,
}

impl ReleaseQuery {
    /// The release ID if it looks like an MBID, allowing a direct lookup
    pub fn direct_release_id(&self) -> Option<&str> {
        is_mbid(&self.release_id).then_some(self.release_id.as_str())
    }

    /// Build the Lucene query string, or `None` if there is nothing to search on
    pub fn to_lucene(&self) -> Option<String> {
        let mut params = Vec::new();
        let mut push = |key: &str, value: &str| {
            if !value.is_empty() {
                params.push(field(key, value));
            }
        };

        push("arid", &self.artist_id);
        push("rgid", &self.release_group_id);
        push("release", &self.release.to_lowercase());
        push("artist", &self.artist.to_lowercase());
        push(
            "date",
            &self.date.map(|d| d.to_string()).unwrap_or_default(),
        );
        push("format", &self.format.to_lowercase());
        push("label", &self.label.to_lowercase());
        push("catno", &self.catalog_num.to_lowercase());
        push("barcode", &self.barcode);
        if self.num_tracks > 0 {
            push("tracks", &self.num_tracks.to_string());
        }

        if params.is_empty() {
            return None;
        }
        Some(params.join(" "))
    }
}

fn field(key: &str, value: &str) -> String {
    format!("{}:({})", key, escape_lucene(value))
}

const LUCENE_SPECIAL: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

fn escape_lucene(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        // && and || are escaped as a pair
        if (c == '&' || c == '|') && chars.peek() == Some(&c) {
            chars.next();
            out.push('\\');
            out.push(c);
            out.push(c);
            continue;
        }
        if LUCENE_SPECIAL.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Whether `s` is a UUID in 8-4-4-4-12 hex form
pub fn is_mbid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.chars().all(|c| c.is_ascii_hexdigit()))
}
