//! Match scoring between local file tags and a candidate release.
//!
//! Every compared field produces a [`Diff`] for display. Fields where both
//! sides are known also feed a running score: the weighted Levenshtein
//! distance of the normalized strings over their normalized lengths,
//! expressed as `100 - distance%`. Heavy weights on mismatching fields can
//! push the score below zero.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::enrichment::domain::{self, Release, Track};
use crate::metadata::keys::{self, Tags};

pub const FIELD_RELEASE: &str = "release";
pub const FIELD_ARTIST: &str = "artist";
pub const FIELD_LABEL: &str = "label";
pub const FIELD_CATALOG_NUM: &str = "catalogue num";
pub const FIELD_UPC: &str = "upc";
pub const FIELD_MEDIA_FORMAT: &str = "media format";
pub const FIELD_TRACK: &str = "track";

/// Joins artist and title in per-track comparisons
const TRACK_SEPARATOR: &str = " – ";

/// Per-field weights. Unlisted fields weigh 1.0; a weight of 0 makes a
/// field informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(pub HashMap<String, f64>);

impl Weights {
    pub fn get(&self, field: &str) -> f64 {
        self.0.get(field).copied().unwrap_or(1.0)
    }

    pub fn with(mut self, field: &str, weight: f64) -> Self {
        self.0.insert(field.to_string(), weight);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Equal,
    Delete,
    Insert,
}

/// A run of text in a display diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

/// Display diff of one field. `before` holds equal and deleted runs,
/// `after` holds equal and inserted runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    pub field: String,
    pub before: Vec<Fragment>,
    pub after: Vec<Fragment>,
    pub equal: bool,
}

/// Running score accumulator
#[derive(Debug, Clone, Default)]
pub struct Differ {
    total_dist: f64,
    total: f64,
    score: f64,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score so far; 0 until some field with both sides known was compared
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Compare one field, updating the running score
    pub fn diff(&mut self, weight: f64, field: &str, a: &str, b: &str) -> Diff {
        let (before, after) = display_fragments(a, b);
        let diff = Diff {
            field: field.to_string(),
            before,
            after,
            equal: a == b,
        };

        // unknown fields are not penalized, weightless ones don't count at all
        if a.is_empty() || b.is_empty() || weight == 0.0 {
            return diff;
        }

        let (a_norm, b_norm) = (norm(a), norm(b));
        let dist = strsim::levenshtein(&a_norm, &b_norm);
        let len = a_norm.chars().count().max(b_norm.chars().count());

        self.total_dist += dist as f64 * weight;
        self.total += len as f64;
        if self.total > 0.0 {
            self.score = 100.0 - (self.total_dist * 100.0 / self.total);
        }

        diff
    }
}

/// Score a release against local files, returning the score and per-field diffs.
///
/// Release-level fields are compared against the first local file. Tracks
/// are compared pairwise by index; a missing side compares as empty.
pub fn diff_release(
    weights: &Weights,
    release: &Release,
    tracks: &[Track],
    local: &[Tags],
) -> (f64, Vec<Diff>) {
    if tracks.is_empty() {
        return (0.0, Vec::new());
    }

    let label_info = release.label_info();
    let empty = Tags::new();
    let first = local.first().unwrap_or(&empty);

    let mut differ = Differ::new();
    let mut diffs = Vec::with_capacity(6 + tracks.len().max(local.len()));

    let release_fields = [
        (FIELD_RELEASE, first.get(keys::ALBUM), release.title.clone()),
        (
            FIELD_ARTIST,
            first.get(keys::ALBUM_ARTIST),
            domain::artists_string(&release.artists),
        ),
        (FIELD_LABEL, first.get(keys::LABEL), label_info.label.name),
        (
            FIELD_CATALOG_NUM,
            first.get(keys::CATALOG_NUMBER),
            label_info.catalog_number,
        ),
        (FIELD_UPC, first.get(keys::BARCODE), release.barcode.clone()),
        (
            FIELD_MEDIA_FORMAT,
            first.get(keys::MEDIA),
            release.media_format().to_string(),
        ),
    ];
    for (field, a, b) in release_fields {
        diffs.push(differ.diff(weights.get(field), field, a, &b));
    }

    for i in 0..local.len().max(tracks.len()) {
        let a = local
            .get(i)
            .map(|t| join_non_empty(t.get(keys::ARTIST), t.get(keys::TITLE)))
            .unwrap_or_default();
        let b = tracks
            .get(i)
            .map(|t| join_non_empty(&domain::artists_string(&t.artists), &t.title))
            .unwrap_or_default();
        let field = format!("{} {}", FIELD_TRACK, i + 1);
        diffs.push(differ.diff(weights.get(FIELD_TRACK), &field, &a, &b));
    }

    (differ.score(), diffs)
}

fn join_non_empty(artist: &str, title: &str) -> String {
    [artist, title]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(TRACK_SEPARATOR)
}

/// Keep letters (lower-cased) and digits, drop everything else
pub fn norm(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_numeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split two strings into shared prefix, differing middle and shared suffix
fn display_fragments(a: &str, b: &str) -> (Vec<Fragment>, Vec<Fragment>) {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    let prefix = a_chars
        .iter()
        .zip(&b_chars)
        .take_while(|(x, y)| x == y)
        .count();
    let suffix = a_chars[prefix..]
        .iter()
        .rev()
        .zip(b_chars[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let run = |chars: &[char]| chars.iter().collect::<String>();
    let build = |chars: &[char], kind: FragmentKind| {
        let parts = [
            (FragmentKind::Equal, run(&chars[..prefix])),
            (kind, run(&chars[prefix..chars.len() - suffix])),
            (FragmentKind::Equal, run(&chars[chars.len() - suffix..])),
        ];
        parts
            .into_iter()
            .filter(|(_, text)| !text.is_empty())
            .map(|(kind, text)| Fragment { kind, text })
            .collect::<Vec<_>>()
    };

    (
        build(&a_chars, FragmentKind::Delete),
        build(&b_chars, FragmentKind::Insert),
    )
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Identical inputs always score 100
        #[test]
        fn identical_fields_score_100(fields in prop::collection::vec("[a-zA-Z0-9]{1,20}", 1..10)) {
            let mut differ = Differ::new();
            for f in &fields {
                differ.diff(1.0, "x", f, f);
            }
            prop_assert_eq!(differ.score(), 100.0);
        }

        /// Same inputs produce the same score
        #[test]
        fn deterministic(a in ".{0,30}", b in ".{0,30}", w in 0.0f64..3.0) {
            let mut d1 = Differ::new();
            let mut d2 = Differ::new();
            d1.diff(w, "x", &a, &b);
            d2.diff(w, "x", &a, &b);
            prop_assert_eq!(d1.score(), d2.score());
        }

        /// Display fragments reassemble both inputs
        #[test]
        fn fragments_reassemble(a in ".{0,30}", b in ".{0,30}") {
            let (before, after) = display_fragments(&a, &b);
            let before: String = before.iter().map(|f| f.text.as_str()).collect();
            let after: String = after.iter().map(|f| f.text.as_str()).collect();
            prop_assert_eq!(before, a);
            prop_assert_eq!(after, b);
        }
    }
}
