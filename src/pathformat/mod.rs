//! Destination path formatting.
//!
//! A [`Format`] is parsed once from the configured template and executed
//! per track. Parsing probes the template with synthetic releases and
//! rejects it when two different tracks or two different releases would
//! land on the same path.

pub mod funcs;
pub mod safepath;
pub mod template;

use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::enrichment::domain::{ArtistCredit, Artist, Medium, Release, Track};

pub use safepath::{safe_path, safe_path_no_norm};
use template::{Data, Template};

const DELIM_LEFT: &str = "{{";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FormatError {
    #[error("invalid format: {0}")]
    Invalid(String),

    #[error("ambiguous format: {0}")]
    Ambiguous(String),

    #[error("bad release: {0}")]
    BadRelease(String),

    #[error("bad data: {0}")]
    BadData(String),

    #[error("path format not initialised")]
    NotInitialised,

    #[error("create path: {0}")]
    Execute(String),
}

/// A parsed and validated path template
#[derive(Debug, Clone, Default)]
pub struct Format {
    template: Option<Template>,
    root: PathBuf,
}

impl Format {
    pub fn parse(text: &str) -> Result<Self, FormatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FormatError::Invalid("empty format".into()));
        }
        let Some((root, _)) = text.split_once(DELIM_LEFT) else {
            return Err(FormatError::Invalid("format has no template actions".into()));
        };
        if root.matches('/').count() < 2 {
            return Err(FormatError::Invalid("not enough path segments".into()));
        }

        let template = Template::parse(text).map_err(FormatError::Invalid)?;
        validate(&template)?;

        let root = clean_path(Path::new(root));
        let root = std::fs::canonicalize(&root).unwrap_or(root);

        Ok(Self {
            template: Some(template),
            root,
        })
    }

    /// Literal directory prefix of the template, symlinks resolved when it exists
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Render the destination path of the track at `index` in the release's
    /// flattened track list. `ext` includes the leading dot.
    pub fn execute(&self, release: &Release, index: usize, ext: &str) -> Result<PathBuf, FormatError> {
        let template = self.template.as_ref().ok_or(FormatError::NotInitialised)?;
        execute(template, release, index, ext)
    }
}

fn execute(template: &Template, release: &Release, index: usize, ext: &str) -> Result<PathBuf, FormatError> {
    let tracks = release.flat_tracks();
    if tracks.is_empty() {
        return Err(FormatError::BadRelease("release has no tracks".into()));
    }
    if !tracks.iter().any(|t| t.position > 0) {
        return Err(FormatError::BadRelease("all tracks have 0 position".into()));
    }
    let Some(track) = tracks.get(index) else {
        return Err(FormatError::BadRelease(format!(
            "track index {} out of range for {} tracks",
            index,
            tracks.len()
        )));
    };

    let num_pregap = tracks[..index].iter().filter(|t| t.position == 0).count();
    let track_num = if track.position > 0 {
        (index + 1 - num_pregap) as u32
    } else {
        0
    };

    let data = Data {
        release,
        track,
        track_num,
        track_count: tracks.len(),
        total_discs: release.total_discs(),
        is_compilation: release.is_compilation(),
        disambiguation: release.disambiguation_text(),
        ext,
    };
    let path = template.execute(&data).map_err(FormatError::Execute)?;

    if path.ends_with('/') {
        return Err(FormatError::BadData(format!(
            "{:?}: output path has trailing slash",
            path
        )));
    }
    if path.contains("//") {
        return Err(FormatError::BadData(format!(
            "{:?}: output path would contain adjacent separators",
            path
        )));
    }
    Ok(clean_path(Path::new(&path)))
}

/// Execute the template against synthetic releases that must not collide
fn validate(template: &Template) -> Result<(), FormatError> {
    let same = |r1: &Release, i1: usize, r2: &Release, i2: usize| -> Result<bool, FormatError> {
        Ok(execute(template, r1, i1, "")? == execute(template, r2, i2, "")?)
    };

    if same(
        &probe_release("ar", "release-same", &["track 1", "track 1"]),
        0,
        &probe_release("ar", "release-same", &["track 2", "track 2"]),
        1,
    )? {
        return Err(FormatError::Ambiguous(
            "two different tracks have the same path".into(),
        ));
    }

    if same(
        &probe_release("ar", "release 1", &["track same"]),
        0,
        &probe_release("ar", "release 2", &["track same"]),
        0,
    )? {
        return Err(FormatError::Ambiguous(
            "two releases with the same track info result in the same path".into(),
        ));
    }
    Ok(())
}

fn probe_release(artist: &str, title: &str, tracks: &[&str]) -> Release {
    Release {
        title: title.to_string(),
        artists: vec![ArtistCredit {
            name: artist.to_string(),
            artist: Artist {
                name: artist.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }],
        media: vec![Medium {
            position: 1,
            tracks: tracks
                .iter()
                .enumerate()
                .map(|(i, t)| Track {
                    title: t.to_string(),
                    position: i as u32 + 1,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Lexically normalize a path: drop `.` and repeated separators, resolve `..`
/// against preceding components. Never touches the filesystem.
pub fn clean_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::domain::{PartialDate, ReleaseGroup};

    #[test]
    fn test_validation() {
        assert_eq!(
            Format::default().execute(&Release::default(), 0, ""),
            Err(FormatError::NotInitialised)
        );

        for bad in ["", " ", "🤤", "albums/{{ track.title }}"] {
            assert!(
                matches!(Format::parse(bad), Err(FormatError::Invalid(_))),
                "{:?}",
                bad
            );
        }

        for ambiguous in [
            r#"/albums/test/{{ release.artists | join " " }}/{{ release.title }}"#,
            "/albums/test/{{ track.title }}",
            "/albums/test/{{ track_num }}",
        ] {
            assert!(
                matches!(Format::parse(ambiguous), Err(FormatError::Ambiguous(_))),
                "{:?}",
                ambiguous
            );
        }

        for bad_data in [
            // probe releases have no IDs
            r#"/albums/test/{{ release.artists | join " " }}/{{ release.id }}/"#,
            r#"/albums/test/{{ release.artists | join " " }}//"#,
            r#"/albums/test/{{ release.artists | join " " }}/{{ release.title }}/{{ track.id }}"#,
            "/albums/test/{{ track.id }}/",
        ] {
            assert!(
                matches!(Format::parse(bad_data), Err(FormatError::BadData(_))),
                "{:?}",
                bad_data
            );
        }

        let pf = Format::parse(
            r#"/albums/test/{{ release.artists | join " " }}/{{ release.title }}/{{ track_num }}"#,
        )
        .unwrap();
        assert_eq!(pf.root(), Path::new("/albums/test"));
    }

    #[test]
    fn test_parse_error_is_invalid() {
        assert!(matches!(
            Format::parse("/albums/test/{{ track.nope }}"),
            Err(FormatError::Invalid(_))
        ));
        assert!(matches!(
            Format::parse("/albums/test/{{ if track.title }}{{ track_num }}"),
            Err(FormatError::Invalid(_))
        ));
    }

    fn luke_vibert() -> Release {
        Release {
            title: "Valvable".into(),
            release_group: ReleaseGroup {
                first_release_date: PartialDate::parse("2018-12-31"),
                ..Default::default()
            },
            artists: vec![ArtistCredit {
                name: "credit name".into(),
                artist: Artist {
                    name: "Luke Vibert".into(),
                    ..Default::default()
                },
                ..Default::default()
            }],
            media: vec![Medium {
                tracks: vec![Track {
                    title: "Sharon's Tone".into(),
                    position: 1,
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_path_format() {
        let mut release = luke_vibert();

        let pf = Format::parse(concat!(
            r#"/music/albums/{{ release.artists | sort | join "; " | safepath }}/"#,
            r#"({{ release.original_year }}) {{ release.title | safepath }}"#,
            r#"{{ if disambiguation }} ({{ disambiguation | safepath }}){{ end }}/"#,
            r#"{{ track_num | pad0 2 }}.{{ track_count | pad0 2 }} {{ track.title | safepath }}{{ ext }}"#,
        ))
        .unwrap();

        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new("/music/albums/Luke Vibert/(2018) Valvable/01.01 Sharon's Tone.flac")
        );

        release.release_group.disambiguation = "Deluxe Edition".into();
        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new(
                "/music/albums/Luke Vibert/(2018) Valvable (Deluxe Edition)/01.01 Sharon's Tone.flac"
            )
        );

        let pf = Format::parse(
            r#"/music/albums/{{ release.artists | the | sort | join "; " | safepath }}/{{ release.title }}/{{ track_num }}{{ ext }}"#,
        )
        .unwrap();

        release.artists[0].artist.name = "A House".into();
        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new("/music/albums/House, A/Valvable/1.flac")
        );

        release.artists[0].artist.name = "The House".into();
        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new("/music/albums/House, The/Valvable/1.flac")
        );
    }

    fn medium(position: u32, title: &str, format: &str, tracks: &[&str]) -> Medium {
        Medium {
            position,
            title: title.into(),
            format: format.into(),
            tracks: tracks
                .iter()
                .enumerate()
                .map(|(i, t)| Track {
                    title: t.to_string(),
                    position: i as u32 + 1,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    fn reise_reise() -> Release {
        Release {
            title: "Reise, Reise".into(),
            artists: luke_vibert().artists,
            media: vec![
                medium(1, "Live Recordings", "CD", &["Reise, Reise", "Mein Teil"]),
                medium(2, "Bonus Material", "CD", &["Dalai Lama", "Keine Lust"]),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_multi_disc_number_in_path() {
        let release = reise_reise();
        let pf = Format::parse(
            "/music/{{ release.title }}/Disc {{ disc_num }}/{{ track.position | pad0 2 }} {{ track.title }}{{ ext }}",
        )
        .unwrap();

        let expected = [
            "/music/Reise, Reise/Disc 1/01 Reise, Reise.flac",
            "/music/Reise, Reise/Disc 1/02 Mein Teil.flac",
            "/music/Reise, Reise/Disc 2/01 Dalai Lama.flac",
            "/music/Reise, Reise/Disc 2/02 Keine Lust.flac",
        ];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(pf.execute(&release, i, ".flac").unwrap(), Path::new(want));
        }
    }

    #[test]
    fn test_multi_disc_title_and_total() {
        let release = reise_reise();

        let pf = Format::parse(
            "/music/{{ release.title }}/{{ if disc_title }}{{ disc_title | safepath }}{{ else }}Disc {{ disc_num }}{{ end }}/{{ track.title }}{{ ext }}",
        )
        .unwrap();
        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new("/music/Reise, Reise/Live Recordings/Reise, Reise.flac")
        );
        assert_eq!(
            pf.execute(&release, 2, ".flac").unwrap(),
            Path::new("/music/Reise, Reise/Bonus Material/Dalai Lama.flac")
        );

        let pf = Format::parse(
            "/music/{{ release.title }}/{{ disc_num }} of {{ total_discs }}/{{ track.title }}{{ ext }}",
        )
        .unwrap();
        assert_eq!(
            pf.execute(&release, 2, ".flac").unwrap(),
            Path::new("/music/Reise, Reise/2 of 2/Dalai Lama.flac")
        );
    }

    #[test]
    fn test_conditional_disc_folder() {
        let pf = Format::parse(
            "/music/{{ release.title }}{{ if total_discs | gt 1 }}/Disc {{ disc_num }}{{ end }}/{{ track.title }}{{ ext }}",
        )
        .unwrap();

        assert_eq!(
            pf.execute(&reise_reise(), 0, ".flac").unwrap(),
            Path::new("/music/Reise, Reise/Disc 1/Reise, Reise.flac")
        );

        let single = Release {
            title: "Single Album".into(),
            media: vec![medium(1, "", "CD", &["Track One"])],
            ..Default::default()
        };
        assert_eq!(
            pf.execute(&single, 0, ".flac").unwrap(),
            Path::new("/music/Single Album/Track One.flac")
        );
    }

    #[test]
    fn test_disc_renumbering_after_video_filter() {
        let release = Release {
            title: "Deluxe Edition".into(),
            media: vec![
                medium(1, "", "CD", &["Audio Track 1"]),
                medium(2, "", "DVD-Video", &["Video Track"]),
                medium(3, "", "CD", &["Audio Track 2"]),
            ],
            ..Default::default()
        };
        let pf = Format::parse("/music/{{ release.title }}/Disc {{ disc_num }}/{{ track.title }}{{ ext }}")
            .unwrap();

        assert_eq!(
            pf.execute(&release, 0, ".flac").unwrap(),
            Path::new("/music/Deluxe Edition/Disc 1/Audio Track 1.flac")
        );
        assert_eq!(
            pf.execute(&release, 1, ".flac").unwrap(),
            Path::new("/music/Deluxe Edition/Disc 2/Audio Track 2.flac")
        );
    }

    #[test]
    fn test_pregap_numbering() {
        let mut release = reise_reise();
        release.media[0].pregap = Some(Track {
            title: "Hidden".into(),
            position: 0,
            ..Default::default()
        });
        let pf = Format::parse("/music/{{ release.title }}/{{ track_num }} {{ track.title }}{{ ext }}")
            .unwrap();

        assert_eq!(
            pf.execute(&release, 0, "").unwrap(),
            Path::new("/music/Reise, Reise/0 Hidden")
        );
        assert_eq!(
            pf.execute(&release, 1, "").unwrap(),
            Path::new("/music/Reise, Reise/1 Reise, Reise")
        );
        assert_eq!(
            pf.execute(&release, 4, "").unwrap(),
            Path::new("/music/Reise, Reise/4 Keine Lust")
        );
    }

    #[test]
    fn test_execute_bad_release() {
        let pf = Format::parse("/music/{{ release.title }}/{{ track_num }} {{ track.title }}").unwrap();

        assert!(matches!(
            pf.execute(&Release::default(), 0, ""),
            Err(FormatError::BadRelease(_))
        ));

        let mut unordered = reise_reise();
        for medium in &mut unordered.media {
            for track in &mut medium.tracks {
                track.position = 0;
            }
        }
        assert!(matches!(
            pf.execute(&unordered, 0, ""),
            Err(FormatError::BadRelease(_))
        ));

        assert!(matches!(
            pf.execute(&reise_reise(), 99, ""),
            Err(FormatError::BadRelease(_))
        ));
    }

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path(Path::new("/a//b/./c/")), Path::new("/a/b/c"));
        assert_eq!(clean_path(Path::new("/a/b/../c")), Path::new("/a/c"));
        assert_eq!(clean_path(Path::new("/../a")), Path::new("/a"));
        assert_eq!(clean_path(Path::new("../a")), Path::new("../a"));
        assert_eq!(clean_path(Path::new("")), Path::new("."));
    }
}
