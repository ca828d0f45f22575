//! Filesystem-safe path segment sanitizing.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Characters invalid on at least one common filesystem
const INVALID: &[char] = &['\\', ':', '*', '?', '"', '<', '>', '|'];

/// Punctuation allowed through the normalizing sanitizer
const SAFE_PUNCTUATION: &[char] = &[
    '!', '#', '$', '%', '&', '\'', '(', ')', '+', ',', '-', '.', ';', '=', '@', '[', ']', '^',
    '_', '`', '{', '}', '~',
];

/// Make a string usable as one path segment: separators become spaces,
/// invalid and control characters are removed, whitespace is collapsed.
/// Accents are stripped, symbols are transliterated to ASCII, and anything
/// else outside letters, digits and a small set of punctuation is dropped,
/// so the result is portable across filesystems.
pub fn safe_path(input: &str) -> String {
    let mut out = String::new();
    for c in safe_path_no_norm(input).nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if is_portable(c) {
            out.push(c);
        } else if let Some(ascii) = transliterate(c) {
            out.extend(ascii.chars().filter_map(|t| match t {
                '/' => Some(' '),
                t if is_portable(t) => Some(t),
                _ => None,
            }));
        }
    }
    dot_segment_guard(collapse_whitespace(&out))
}

/// Like [`safe_path`] but keeps every printable character that is valid in a path
pub fn safe_path_no_norm(input: &str) -> String {
    let replaced: String = input
        .chars()
        .filter_map(|c| match c {
            '/' => Some(' '),
            c if c.is_control() || INVALID.contains(&c) => None,
            c => Some(c),
        })
        .collect();
    dot_segment_guard(collapse_whitespace(&replaced))
}

fn is_portable(c: char) -> bool {
    c.is_alphanumeric() || c == ' ' || SAFE_PUNCTUATION.contains(&c)
}

/// ASCII spelling of a symbol. Pictographs are dropped rather than spelled out.
fn transliterate(c: char) -> Option<&'static str> {
    let pictograph = matches!(c, '\u{2600}'..='\u{27BF}') || c >= '\u{1F000}';
    if pictograph {
        return None;
    }
    deunicode::deunicode_char(c)
}

/// `.` and `..` would name the current or parent directory
fn dot_segment_guard(segment: String) -> String {
    match segment.as_str() {
        "." | ".." => "_".to_string(),
        _ => segment,
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_path() {
        assert_eq!(safe_path("hello"), "hello");
        assert_eq!(safe_path("hello/"), "hello");
        assert_eq!(safe_path("hello/a"), "hello a");
        assert_eq!(safe_path("hello / a"), "hello a");
        assert_eq!(safe_path("hel\x00lo"), "hello");
        assert_eq!(safe_path("a  b"), "a b");
        assert_eq!(safe_path("(2004) Kesto (234.48:4)"), "(2004) Kesto (234.484)");
        assert_eq!(safe_path("01.33 Rähinä I Mayhem I"), "01.33 Rahina I Mayhem I");
        assert_eq!(safe_path("(2007) ✝"), "(2007)");
        assert_eq!(safe_path("50 ¢.flac"), "50 C .flac");
        // letters in any script survive
        assert_eq!(safe_path("夏の光"), "夏の光");
    }

    #[test]
    fn test_safe_path_no_norm() {
        assert_eq!(safe_path_no_norm("hello"), "hello");
        assert_eq!(safe_path_no_norm("hello/"), "hello");
        assert_eq!(safe_path_no_norm("hello/a"), "hello a");
        assert_eq!(safe_path_no_norm("hello / a"), "hello a");
        assert_eq!(safe_path_no_norm("hel\x00lo"), "hello");
        assert_eq!(safe_path_no_norm("a  b"), "a b");
        assert_eq!(safe_path_no_norm("(2004) Kesto (234.48:4)"), "(2004) Kesto (234.484)");
        assert_eq!(safe_path_no_norm("01.33 Rähinä I Mayhem I"), "01.33 Rähinä I Mayhem I");
        assert_eq!(safe_path_no_norm("50 ¢.flac"), "50 ¢.flac");
        assert_eq!(safe_path_no_norm("(2007) ✝"), "(2007) ✝");
    }

    #[test]
    fn test_dot_segments_are_replaced() {
        assert_eq!(safe_path("."), "_");
        assert_eq!(safe_path(".."), "_");
        assert_eq!(safe_path(" .. "), "_");
        assert_eq!(safe_path("✝ .."), "_");
        assert_eq!(safe_path_no_norm(".."), "_");
        assert_eq!(safe_path_no_norm("/./"), "_");
        assert_eq!(safe_path("..."), "...");
        assert_eq!(safe_path(".hidden"), ".hidden");
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Sanitized names never contain separators or invalid characters
        #[test]
        fn never_contains_invalid(input in ".{0,50}") {
            for out in [safe_path(&input), safe_path_no_norm(&input)] {
                prop_assert!(!out.contains('/'));
                for c in INVALID {
                    prop_assert!(!out.contains(*c), "found {:?} in {:?}", c, out);
                }
                prop_assert!(!out.starts_with(' ') && !out.ends_with(' '));
                prop_assert!(!out.contains("  "));
                prop_assert!(out != "." && out != "..");
            }
        }

        /// Sanitizing is idempotent
        #[test]
        fn idempotent(input in ".{0,50}") {
            let once = safe_path(&input);
            prop_assert_eq!(safe_path(&once), once.clone());
            let once = safe_path_no_norm(&input);
            prop_assert_eq!(safe_path_no_norm(&once), once);
        }
    }
}
