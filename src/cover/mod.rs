//! Picking the cover image out of a release directory.
//!
//! Any image file is a candidate. Candidates are ranked by:
//!
//! 1. **Art type keywords** in the path: front/cover/album beat
//!    folder/albumart, which beat scan. No keyword ranks after all of them
//! 2. **Numbers** in the path, lowest first (`cover1.jpg` before `cover2.jpg`)
//! 3. **File type**: PNG before JPEG/BMP/GIF
//!
//! The lowest rank wins.

use std::cmp::Ordering;
use std::path::Path;

/// Art type keywords, longest first so `albumart` isn't read as `album`
const ART_TYPES: &[(&str, i32)] = &[
    ("albumart", -2),
    ("folder", -2),
    ("album", -3),
    ("cover", -3),
    ("front", -3),
    ("scan", -1),
];

const FILE_TYPES: &[(&str, i32)] = &[
    ("png", -2),
    ("jpg", -1),
    ("jpeg", -1),
    ("bmp", -1),
    ("gif", -1),
];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Whether a path looks like a cover image, by extension
pub fn is_cover(path: &Path) -> bool {
    extension(path).is_some_and(|ext| FILE_TYPES.iter().any(|(e, _)| *e == ext))
}

/// Rank two cover candidates. `Less` means `a` is the better cover.
pub fn compare(a: &Path, b: &Path) -> Ordering {
    let (a, b) = (a.to_string_lossy(), b.to_string_lossy());
    art_type_ranks(&a)
        .cmp(&art_type_ranks(&b))
        .then_with(|| numbers(&a).cmp(&numbers(&b)))
        .then_with(|| file_type_rank(&a).cmp(&file_type_rank(&b)))
}

/// The better of the current best and a new candidate
pub fn best_between<'a>(current: Option<&'a Path>, candidate: &'a Path) -> &'a Path {
    match current {
        Some(current) if compare(current, candidate) != Ordering::Greater => current,
        _ => candidate,
    }
}

/// Ranks of every keyword in the path, left to right; `[0]` when none
fn art_type_ranks(path: &str) -> Vec<i32> {
    let lower = path.to_lowercase();
    let mut ranks = Vec::new();
    let mut rest = lower.as_str();

    while !rest.is_empty() {
        match ART_TYPES.iter().find(|(kw, _)| rest.starts_with(kw)) {
            Some((kw, rank)) => {
                ranks.push(*rank);
                rest = &rest[kw.len()..];
            }
            None => {
                let skip = rest.chars().next().map_or(1, char::len_utf8);
                rest = &rest[skip..];
            }
        }
    }

    if ranks.is_empty() {
        ranks.push(0);
    }
    ranks
}

/// Every run of ASCII digits in the path, as numbers
fn numbers(path: &str) -> Vec<u64> {
    path.split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(u64::MAX))
        .collect()
}

fn file_type_rank(path: &str) -> i32 {
    extension(Path::new(path))
        .and_then(|ext| FILE_TYPES.iter().find(|(e, _)| *e == ext).map(|(_, r)| *r))
        .unwrap_or(0)
}
