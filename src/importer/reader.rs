//! Reading a release directory: cover candidates and sorted audio files.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cover;
use crate::error::{Error, Result};
use crate::metadata::{self, TagCodec, Tags, keys};

/// An audio file in the source directory and the tags it had on disk
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub tags: Tags,
}

/// Contents of a release directory, audio files in play order
#[derive(Debug, Clone, Default)]
pub struct ReleaseDir {
    pub cover: Option<PathBuf>,
    pub files: Vec<LocalFile>,
}

impl ReleaseDir {
    pub fn tags(&self) -> Vec<Tags> {
        self.files.iter().map(|f| f.tags.clone()).collect()
    }
}

/// Read the files directly in `dir` and one level of subdirectories below
/// it (per-disc folders).
pub fn read_release_dir(dir: &Path, codec: &dyn TagCodec) -> Result<ReleaseDir> {
    let mut paths = list_files(dir)?;
    for sub in list_dirs(dir)? {
        paths.extend(list_files(&sub)?);
    }

    let mut cover: Option<PathBuf> = None;
    let mut files = Vec::new();

    for path in paths {
        if cover::is_cover(&path) {
            let best = cover::best_between(cover.as_deref(), &path).to_path_buf();
            cover = Some(best);
            continue;
        }
        if !metadata::is_audio_file(&path) {
            continue;
        }
        let tags = codec.read_tags(&path)?;
        files.push(LocalFile { path, tags });
    }

    if files.is_empty() {
        return Err(Error::NoTracks);
    }

    let parents: BTreeSet<&Path> = files.iter().filter_map(|f| f.path.parent()).collect();
    if parents.len() == 1 {
        if let Some(only) = parents.first().filter(|p| **p != dir) {
            return Err(Error::NestedTracks(only.to_path_buf()));
        }
    }

    let numbers_tagged = files.iter().all(|f| !f.tags.get(keys::TRACK_NUMBER).is_empty());
    let numbers_in_names = files.iter().all(|f| {
        f.path
            .file_name()
            .map(|n| n.to_string_lossy().chars().any(|c| c.is_ascii_digit()))
            .unwrap_or(false)
    });
    if !numbers_tagged && !numbers_in_names {
        return Err(Error::NotSortable);
    }

    files.sort_by(compare_files);
    tracing::debug!(dir = %dir.display(), tracks = files.len(), cover = ?cover, "Read release dir");

    Ok(ReleaseDir { cover, files })
}

fn compare_files(a: &LocalFile, b: &LocalFile) -> Ordering {
    let parent = |f: &LocalFile| {
        f.path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    natural_cmp(a.tags.get(keys::DISC_NUMBER), b.tags.get(keys::DISC_NUMBER))
        .then_with(|| natural_cmp(&parent(a), &parent(b)))
        .then_with(|| natural_cmp(a.tags.get(keys::TRACK_NUMBER), b.tags.get(keys::TRACK_NUMBER)))
        .then_with(|| natural_cmp(&a.path.to_string_lossy(), &b.path.to_string_lossy()))
}

/// Sorted regular files directly in `dir`
fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    list(dir, |t| t.is_file())
}

fn list_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    list(dir, |t| t.is_dir())
}

fn list(dir: &Path, keep: impl Fn(&fs::FileType) -> bool) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::file(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::file(dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::file(entry.path(), e))?;
        if keep(&file_type) {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Compare strings with runs of digits ordered by numeric value, so
/// `track2` sorts before `track10`
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let x = take_digits(&mut a);
                let y = take_digits(&mut b);
                let (xt, yt) = (x.trim_start_matches('0'), y.trim_start_matches('0'));
                let ord = xt
                    .len()
                    .cmp(&yt.len())
                    .then_with(|| xt.cmp(yt))
                    .then_with(|| x.len().cmp(&y.len()));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                if x != y {
                    return x.cmp(&y);
                }
                a.next();
                b.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        digits.push(c);
    }
    digits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeCodec, fixtures};

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_natural_cmp() {
        let mut names = vec!["track10.flac", "track2.flac", "track1.flac"];
        names.sort_by(|a, b| natural_cmp(a, b));
        assert_eq!(names, vec!["track1.flac", "track2.flac", "track10.flac"]);

        assert_eq!(natural_cmp("", ""), Ordering::Equal);
        assert_eq!(natural_cmp("", "1"), Ordering::Less);
        assert_eq!(natural_cmp("2", "02"), Ordering::Less);
        assert_eq!(natural_cmp("Disc 2", "Disc 10"), Ordering::Less);
        assert_eq!(natural_cmp("b", "a10"), Ordering::Greater);
    }

    #[test]
    fn test_read_sorts_by_filename_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FakeCodec;
        for name in ["track10.flac", "track2.flac", "track1.flac"] {
            codec.create(&dir.path().join(name), &Tags::new());
        }

        let release = read_release_dir(dir.path(), &codec).unwrap();
        let names: Vec<_> = release
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["track1.flac", "track2.flac", "track10.flac"]);
        assert!(release.cover.is_none());
    }

    #[test]
    fn test_read_sorts_by_tags_and_disc_folders() {
        let dir = tempfile::tempdir().unwrap();
        let codec = FakeCodec;
        let tagged = |n: u32| fixtures::local_tags("A", "B", &format!("t{n}"), n);

        codec.create(&dir.path().join("CD2/a.flac"), &tagged(1));
        codec.create(&dir.path().join("CD1/b.flac"), &tagged(2));
        codec.create(&dir.path().join("CD1/c.flac"), &tagged(1));
        touch(&dir.path().join("CD1/scan.jpg"));
        touch(&dir.path().join("folder.jpg"));
        touch(&dir.path().join("notes.txt"));

        let release = read_release_dir(dir.path(), &codec).unwrap();
        let titles: Vec<_> = release.files.iter().map(|f| f.tags.get(keys::TITLE)).collect();
        assert_eq!(titles, vec!["t1", "t2", "t1"]);
        assert_eq!(release.files[2].path, dir.path().join("CD2/a.flac"));
        assert_eq!(release.cover, Some(dir.path().join("folder.jpg")));
    }

    #[test]
    fn test_read_errors() {
        let codec = FakeCodec;

        let empty = tempfile::tempdir().unwrap();
        touch(&empty.path().join("cover.jpg"));
        assert!(matches!(read_release_dir(empty.path(), &codec), Err(Error::NoTracks)));

        let nested = tempfile::tempdir().unwrap();
        codec.create(&nested.path().join("Album/01.flac"), &Tags::new());
        assert!(matches!(
            read_release_dir(nested.path(), &codec),
            Err(Error::NestedTracks(p)) if p == nested.path().join("Album")
        ));

        let unsortable = tempfile::tempdir().unwrap();
        codec.create(&unsortable.path().join("intro.flac"), &Tags::new());
        codec.create(&unsortable.path().join("outro.flac"), &Tags::new());
        assert!(matches!(
            read_release_dir(unsortable.path(), &codec),
            Err(Error::NotSortable)
        ));
    }

    #[test]
    fn test_read_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_release_dir(&dir.path().join("nope"), &FakeCodec).unwrap_err();
        assert!(err.is_not_found());
    }
}
