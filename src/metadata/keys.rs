//! Normalized tag keys and the multi-valued [`Tags`] map.
//!
//! Containers spell the same field differently (ID3v2 frame IDs, MP4 atoms,
//! Vorbis comment names, ad-hoc spellings from other taggers). Every key is
//! upper-cased and folded through a fixed alias table, so two spellings of
//! one field can never coexist in a [`Tags`] map.
//!
//! See <https://picard-docs.musicbrainz.org/downloads/MusicBrainz_Picard_Tag_Map.html>

use std::collections::BTreeMap;

pub const ALBUM: &str = "ALBUM";
pub const ALBUM_ARTIST: &str = "ALBUMARTIST";
pub const ALBUM_ARTISTS: &str = "ALBUMARTISTS";
pub const ALBUM_ARTIST_CREDIT: &str = "ALBUMARTIST_CREDIT";
pub const ALBUM_ARTISTS_CREDIT: &str = "ALBUMARTISTS_CREDIT";
pub const DATE: &str = "DATE";
pub const ORIGINAL_DATE: &str = "ORIGINALDATE";
pub const MEDIA: &str = "MEDIA";
pub const LABEL: &str = "LABEL";
pub const CATALOG_NUMBER: &str = "CATALOGNUMBER";
pub const BARCODE: &str = "BARCODE";
pub const COMPILATION: &str = "COMPILATION";
pub const RELEASE_TYPE: &str = "RELEASETYPE";

pub const MB_RELEASE_ID: &str = "MUSICBRAINZ_ALBUMID";
pub const MB_RELEASE_GROUP_ID: &str = "MUSICBRAINZ_RELEASEGROUPID";
pub const MB_ALBUM_ARTIST_ID: &str = "MUSICBRAINZ_ALBUMARTISTID";
pub const MB_ALBUM_COMMENT: &str = "MUSICBRAINZ_ALBUMCOMMENT";

pub const TITLE: &str = "TITLE";
pub const ARTIST: &str = "ARTIST";
pub const ARTISTS: &str = "ARTISTS";
pub const ARTIST_CREDIT: &str = "ARTIST_CREDIT";
pub const ARTISTS_CREDIT: &str = "ARTISTS_CREDIT";
pub const GENRE: &str = "GENRE";
pub const GENRES: &str = "GENRES";
pub const TRACK_NUMBER: &str = "TRACKNUMBER";
pub const TRACK_TOTAL: &str = "TRACKTOTAL";
pub const DISC_NUMBER: &str = "DISCNUMBER";
pub const DISC_TOTAL: &str = "DISCTOTAL";
pub const DISC_SUBTITLE: &str = "DISCSUBTITLE";
pub const ISRC: &str = "ISRC";
pub const COMPOSER: &str = "COMPOSER";

pub const MB_RECORDING_ID: &str = "MUSICBRAINZ_TRACKID";
pub const MB_TRACK_ID: &str = "MUSICBRAINZ_RELEASETRACKID";
pub const MB_ARTIST_ID: &str = "MUSICBRAINZ_ARTISTID";

pub const REPLAYGAIN_TRACK_GAIN: &str = "REPLAYGAIN_TRACK_GAIN";
pub const REPLAYGAIN_TRACK_PEAK: &str = "REPLAYGAIN_TRACK_PEAK";
pub const REPLAYGAIN_ALBUM_GAIN: &str = "REPLAYGAIN_ALBUM_GAIN";
pub const REPLAYGAIN_ALBUM_PEAK: &str = "REPLAYGAIN_ALBUM_PEAK";

pub const BPM: &str = "BPM";
pub const INITIAL_KEY: &str = "INITIALKEY";
pub const LYRICS: &str = "LYRICS";
pub const ACOUSTID_FINGERPRINT: &str = "ACOUSTID_FINGERPRINT";
pub const ACOUSTID_ID: &str = "ACOUSTID_ID";
pub const ENCODER: &str = "ENCODER";
pub const ENCODED_BY: &str = "ENCODEDBY";
pub const COMMENT: &str = "COMMENT";

/// Alternative spellings and their canonical key
const ALIASES: &[(&str, &str)] = &[
    ("TALB", ALBUM),
    ("©ALB", ALBUM),
    ("TAL", ALBUM),
    ("ALBUM_ARTIST", ALBUM_ARTIST),
    ("ALBUM ARTIST", ALBUM_ARTIST),
    ("TPE2", ALBUM_ARTIST),
    ("AART", ALBUM_ARTIST),
    ("TP2", ALBUM_ARTIST),
    ("ALBUM_ARTISTS", ALBUM_ARTISTS),
    ("ALBUM_ARTIST_CREDIT", ALBUM_ARTIST_CREDIT),
    ("ALBUM_ARTISTS_CREDIT", ALBUM_ARTISTS_CREDIT),
    ("YEAR", DATE),
    ("RELEASEDATE", DATE),
    ("TDRC", DATE),
    ("TYER", DATE),
    ("TDAT", DATE),
    ("©DAY", DATE),
    ("TYE", DATE),
    ("ORIGINAL_YEAR", ORIGINAL_DATE),
    ("ORIGINALYEAR", ORIGINAL_DATE),
    ("TDOR", ORIGINAL_DATE),
    ("TORY", ORIGINAL_DATE),
    ("TPUB", LABEL),
    ("PUBLISHER", LABEL),
    ("CATALOGNUM", CATALOG_NUMBER),
    ("CAT#", CATALOG_NUMBER),
    ("CATALOGID", CATALOG_NUMBER),
    ("CATNUM", CATALOG_NUMBER),
    ("UPC", BARCODE),
    ("MCN", BARCODE),
    ("TCMP", COMPILATION),
    ("CPIL", COMPILATION),
    ("TIT2", TITLE),
    ("©NAM", TITLE),
    ("TT2", TITLE),
    ("TPE1", ARTIST),
    ("©ART", ARTIST),
    ("TP1", ARTIST),
    ("ARTISTCREDIT", ARTIST_CREDIT),
    ("ARTISTSCREDIT", ARTISTS_CREDIT),
    ("TCON", GENRE),
    ("©GEN", GENRE),
    ("TCO", GENRE),
    ("TRACK", TRACK_NUMBER),
    ("TRACKNUM", TRACK_NUMBER),
    ("TRCK", TRACK_NUMBER),
    ("TRKN", TRACK_NUMBER),
    ("TRK", TRACK_NUMBER),
    ("TOTALTRACKS", TRACK_TOTAL),
    ("TOTALTRACK", TRACK_TOTAL),
    ("DISC", DISC_NUMBER),
    ("TPOS", DISC_NUMBER),
    ("DISK", DISC_NUMBER),
    ("TPA", DISC_NUMBER),
    ("TOTALDISCS", DISC_TOTAL),
    ("TOTALDISKS", DISC_TOTAL),
    ("TOTALDISC", DISC_TOTAL),
    ("TOTALDISK", DISC_TOTAL),
    ("SETSUBTITLE", DISC_SUBTITLE),
    ("TSST", DISC_SUBTITLE),
    ("TCOM", COMPOSER),
    ("©WRT", COMPOSER),
    ("TCM", COMPOSER),
    ("TBPM", BPM),
    ("TMPO", BPM),
    ("TBP", BPM),
    ("INITIAL_KEY", INITIAL_KEY),
    ("TKEY", INITIAL_KEY),
    ("TKE", INITIAL_KEY),
    ("LYRICS:DESCRIPTION", LYRICS),
    ("USLT:DESCRIPTION", LYRICS),
    ("©LYR", LYRICS),
    ("USLT", LYRICS),
    ("ULT", LYRICS),
    ("UNSYNCEDLYRICS", LYRICS),
    ("TSSE", ENCODER),
    ("©TOO", ENCODER),
    ("TSS", ENCODER),
    ("TENC", ENCODED_BY),
    ("ENCODED_BY", ENCODED_BY),
    ("TEN", ENCODED_BY),
    ("COMM", COMMENT),
    ("©CMT", COMMENT),
    ("COM", COMMENT),
    ("DESCRIPTION", COMMENT),
];

/// Canonical form of a tag key: upper-cased, aliases folded
pub fn normalize_key(key: &str) -> String {
    let upper = key.trim().to_uppercase();
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == upper)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(upper)
}

/// Multi-valued tag map keyed by normalized key, ordered by key
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Tags {
    entries: BTreeMap<String, Vec<String>>,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for a key, or `""`
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .get(&normalize_key(key))
            .and_then(|vs| vs.first())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All values for a key
    pub fn values(&self, key: &str) -> &[String] {
        self.entries
            .get(&normalize_key(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Replace every value of a key. Empty values are dropped; setting no
    /// values removes the key.
    pub fn set<I, S>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = normalize_key(key);
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| !v.is_empty())
            .collect();

        if values.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, values);
        }
    }

    /// Append a value, used when a container reports a key more than once
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.entries.entry(normalize_key(key)).or_default().push(value);
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(&normalize_key(key));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut tags = Tags::new();
        for (k, v) in iter {
            tags.add(k.as_ref(), v);
        }
        tags
    }
}
