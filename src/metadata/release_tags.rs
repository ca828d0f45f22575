//! Writing a matched release onto a file's tag map.

use super::keys::{self, Tags};
use crate::enrichment::domain::{
    self, Genre, LabelInfo, PartialDate, Release, Track,
};

/// Locally computed or curated tags that survive a retag.
pub const DEFAULT_KEEP: &[&str] = &[
    keys::REPLAYGAIN_TRACK_GAIN,
    keys::REPLAYGAIN_TRACK_PEAK,
    keys::REPLAYGAIN_ALBUM_GAIN,
    keys::REPLAYGAIN_ALBUM_PEAK,
    keys::BPM,
    keys::LYRICS,
    keys::ACOUSTID_FINGERPRINT,
    keys::ACOUSTID_ID,
    keys::ENCODER,
    keys::ENCODED_BY,
    keys::COMMENT,
];

/// Only this many genres are written per file
const MAX_GENRES: usize = 6;

/// User adjustments on top of [`DEFAULT_KEEP`]
#[derive(Debug, Clone, Default)]
pub struct KeepConfig {
    pub keep: Vec<String>,
    pub drop: Vec<String>,
}

/// Release-wide values computed once per import, not per track
#[derive(Debug, Clone)]
pub struct ReleaseContext<'a> {
    pub release: &'a Release,
    pub label_info: LabelInfo,
    pub genres: Vec<Genre>,
}

impl<'a> ReleaseContext<'a> {
    pub fn new(release: &'a Release) -> Self {
        Self {
            release,
            label_info: release.label_info(),
            genres: release.genres(),
        }
    }
}

/// Build the complete tag set for one track of a matched release
pub fn release_tags(ctx: &ReleaseContext<'_>, track: &Track) -> Tags {
    let release = ctx.release;
    let rg = &release.release_group;
    let genre_names: Vec<&str> = ctx
        .genres
        .iter()
        .take(MAX_GENRES)
        .map(|g| g.name.as_str())
        .collect();

    let mut t = Tags::new();

    t.set(keys::ALBUM, [release.title.as_str()]);
    t.set(keys::ALBUM_ARTIST, [domain::artists_string(&release.artists)]);
    t.set(keys::ALBUM_ARTISTS, domain::artists_names(&release.artists));
    t.set(
        keys::ALBUM_ARTIST_CREDIT,
        [domain::artists_credit_string(&release.artists)],
    );
    t.set(
        keys::ALBUM_ARTISTS_CREDIT,
        domain::artists_credit_names(&release.artists),
    );
    t.set(keys::DATE, [format_date(release.date)]);
    t.set(keys::ORIGINAL_DATE, [format_date(rg.first_release_date)]);
    t.set(keys::MEDIA, [release.media_format()]);
    t.set(keys::LABEL, [ctx.label_info.label.name.as_str()]);
    t.set(keys::CATALOG_NUMBER, [ctx.label_info.catalog_number.as_str()]);
    t.set(keys::BARCODE, [release.barcode.as_str()]);
    t.set(
        keys::COMPILATION,
        [if release.is_compilation() { "1" } else { "" }],
    );
    t.set(keys::RELEASE_TYPE, [rg.primary_type.to_lowercase()]);

    t.set(keys::MB_RELEASE_ID, [release.id.as_str()]);
    t.set(keys::MB_RELEASE_GROUP_ID, [rg.id.as_str()]);
    t.set(
        keys::MB_ALBUM_ARTIST_ID,
        release.artists.iter().map(|c| c.artist.id.as_str()),
    );
    t.set(keys::MB_ALBUM_COMMENT, [release.disambiguation_text()]);

    t.set(keys::TITLE, [track.title.as_str()]);
    t.set(keys::ARTIST, [domain::artists_string(&track.artists)]);
    t.set(keys::ARTISTS, domain::artists_names(&track.artists));
    t.set(
        keys::ARTIST_CREDIT,
        [domain::artists_credit_string(&track.artists)],
    );
    t.set(
        keys::ARTISTS_CREDIT,
        domain::artists_credit_names(&track.artists),
    );
    t.set(keys::GENRE, genre_names.first().copied());
    t.set(keys::GENRES, genre_names.iter().copied());
    // numbered within the disc, so disc 2 starts again at 1
    t.set(keys::TRACK_NUMBER, [track.position.to_string()]);
    t.set(keys::DISC_NUMBER, [track.disc_number.to_string()]);
    t.set(keys::DISC_TOTAL, [release.total_discs().to_string()]);
    t.set(keys::DISC_SUBTITLE, [track.disc_title.as_str()]);

    t.set(keys::MB_RECORDING_ID, [track.recording.id.as_str()]);
    t.set(keys::MB_TRACK_ID, [track.id.as_str()]);
    t.set(
        keys::MB_ARTIST_ID,
        track.artists.iter().map(|c| c.artist.id.as_str()),
    );

    t
}

/// Copy kept tags from the file's previous tags, then clear dropped ones
pub fn apply_keep(dest: &mut Tags, previous: &Tags, conf: &KeepConfig) {
    let kept = DEFAULT_KEEP
        .iter()
        .copied()
        .chain(conf.keep.iter().map(String::as_str));
    for key in kept {
        dest.set(key, previous.values(key).iter().cloned());
    }
    for key in &conf.drop {
        dest.remove(key);
    }
}

fn format_date(date: Option<PartialDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_default()
}
