//! Audio file metadata reading and writing.
//!
//! Tags are exchanged as a normalized multi-valued [`Tags`] map through the
//! [`TagCodec`] trait. [`LoftyCodec`] implements it with the lofty crate
//! for MP3, FLAC, OGG, Opus, M4A, WAV and friends.

pub mod keys;
pub mod release_tags;

use std::path::{Path, PathBuf};
use std::time::Duration;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};

pub use keys::Tags;

/// Extensions the codec can read tags from
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "oga", "opus", "m4a", "m4b", "mp4", "aac", "wav", "aiff", "aif", "ape",
    "wv", "mpc", "spx",
];

/// Whether a path looks like a taggable audio file, by extension
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Errors from reading or writing tags
#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("Failed to read tags from {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write tags to {path}: {message}")]
    Write { path: PathBuf, message: String },
}

impl TagError {
    pub fn read(path: &Path, message: impl ToString) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn write(path: &Path, message: impl ToString) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Technical properties of an audio stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioProperties {
    pub duration: Duration,
    /// Kbps
    pub bitrate: Option<u32>,
    /// Hz
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub embedded_images: usize,
}

/// Reads and writes tags on audio files.
///
/// Implementations are stateless per call and shared across concurrent imports.
pub trait TagCodec: Send + Sync {
    fn read_tags(&self, path: &Path) -> Result<Tags, TagError>;

    /// Write `tags` to the file. With `clear_existing` every tag not in
    /// `tags` is removed, otherwise `tags` is merged over what is there.
    fn write_tags(&self, path: &Path, tags: &Tags, clear_existing: bool) -> Result<(), TagError>;

    fn read_properties(&self, path: &Path) -> Result<AudioProperties, TagError>;
}

/// [`TagCodec`] backed by lofty.
///
/// Keys go through lofty's Vorbis comment mapping, which uses the same
/// names as [`keys`], so ID3v2 and MP4 fields arrive already normalized.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyCodec;

impl TagCodec for LoftyCodec {
    fn read_tags(&self, path: &Path) -> Result<Tags, TagError> {
        let tagged_file = Probe::open(path)
            .map_err(|e| TagError::read(path, e))?
            .read()
            .map_err(|e| TagError::read(path, e))?;

        // Get the primary tag, or fall back to the first available tag
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(Tags::new());
        };

        Ok(tag_to_map(tag))
    }

    fn write_tags(&self, path: &Path, tags: &Tags, clear_existing: bool) -> Result<(), TagError> {
        let mut tagged_file = Probe::open(path)
            .map_err(|e| TagError::write(path, e))?
            .read()
            .map_err(|e| TagError::write(path, e))?;

        // Edit the existing tag so pictures and binary items survive
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let Some(tag) = tagged_file.tag_mut(tag_type) else {
            return Err(TagError::write(path, "container has no writable tag"));
        };

        if clear_existing {
            tag.retain(|item| !matches!(item.value(), ItemValue::Text(_) | ItemValue::Locator(_)));
        }
        for (key, values) in tags.iter() {
            // aliases go too, so YEAR doesn't outlive a new DATE
            tag.retain(|item| item_key_name(item).as_deref() != Some(key));

            let item_key = ItemKey::from_key(TagType::VorbisComments, key);
            let freeform = matches!(item_key, ItemKey::Unknown(_))
                && matches!(tag_type, TagType::VorbisComments | TagType::Ape);
            for value in values {
                let item = TagItem::new(item_key.clone(), ItemValue::Text(value.clone()));
                if freeform {
                    tag.push_unchecked(item);
                } else if !tag.push(item) {
                    tracing::debug!(target: "metadata", key, ?tag_type, "Key not supported by container, skipping");
                }
            }
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| TagError::write(path, e))
    }

    fn read_properties(&self, path: &Path) -> Result<AudioProperties, TagError> {
        let tagged_file = Probe::open(path)
            .map_err(|e| TagError::read(path, e))?
            .read()
            .map_err(|e| TagError::read(path, e))?;

        let properties = tagged_file.properties();
        let embedded_images = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
            .map(|t| t.pictures().len())
            .unwrap_or(0);

        Ok(AudioProperties {
            duration: properties.duration(),
            bitrate: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            embedded_images,
        })
    }
}

/// Normalized name of a tag item's key, `None` when it has no text name
fn item_key_name(item: &TagItem) -> Option<String> {
    item.key()
        .map_key(TagType::VorbisComments, true)
        .map(keys::normalize_key)
}

fn tag_to_map(tag: &Tag) -> Tags {
    let mut tags = Tags::new();
    for item in tag.items() {
        let (Some(key), Some(text)) = (item_key_name(item), item.value().text()) else {
            continue;
        };
        tags.add(&key, text);
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "This is just some text, not music.").expect("Failed to write to temp file");

        let result = LoftyCodec.read_tags(file.path());
        assert!(matches!(result, Err(TagError::Read { .. })));
    }

    #[test]
    fn test_read_non_existent_file_returns_error() {
        let path = Path::new("non_existent_file.mp3");
        assert!(LoftyCodec.read_tags(path).is_err());
        assert!(LoftyCodec.read_properties(path).is_err());
    }

    #[test]
    fn test_write_non_audio_file_returns_error() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "Not an audio file").expect("Failed to write");

        let tags: Tags = [(keys::TITLE, "x")].into_iter().collect();
        let result = LoftyCodec.write_tags(file.path(), &tags, true);
        assert!(matches!(result, Err(TagError::Write { .. })));
    }

    /// Smallest FLAC lofty will parse and rewrite: STREAMINFO plus a
    /// trailing padding block, no audio frames
    fn write_flac(dir: &Path) -> PathBuf {
        let mut bytes = b"fLaC".to_vec();
        bytes.extend_from_slice(&[0x00, 0, 0, 34]);
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&4096u16.to_be_bytes());
        bytes.extend_from_slice(&[0; 6]);
        // 44.1kHz, 2 channels, 16 bits, 0 samples
        let packed: u64 = (44_100 << 44) | (1 << 41) | (15 << 36);
        bytes.extend_from_slice(&packed.to_be_bytes());
        bytes.extend_from_slice(&[0; 16]);
        bytes.extend_from_slice(&[0x81, 0x00, 0x04, 0x00]);
        bytes.extend_from_slice(&[0; 1024]);

        let path = dir.join("01 Track.flac");
        std::fs::write(&path, bytes).expect("Failed to write flac");
        path
    }

    fn add_cover(path: &Path) {
        use lofty::picture::{MimeType, Picture, PictureType};

        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&[0; 32]);

        let mut tag = Tag::new(TagType::VorbisComments);
        tag.insert_text(ItemKey::Year, "1999".to_string());
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            Some(MimeType::Png),
            None,
            data,
        ));
        tag.save_to_path(path, WriteOptions::default())
            .expect("Failed to save cover");
    }

    #[test]
    fn test_write_merge_keeps_other_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());

        let first: Tags = [(keys::TITLE, "Old"), (keys::GENRE, "Jazz")].into_iter().collect();
        LoftyCodec.write_tags(&path, &first, true).unwrap();

        let second: Tags = [(keys::TITLE, "New")].into_iter().collect();
        LoftyCodec.write_tags(&path, &second, false).unwrap();

        let tags = LoftyCodec.read_tags(&path).unwrap();
        assert_eq!(tags.values(keys::TITLE), ["New"]);
        assert_eq!(tags.values(keys::GENRE), ["Jazz"]);
    }

    #[test]
    fn test_write_clear_drops_other_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());

        let first: Tags = [(keys::TITLE, "Old"), (keys::GENRE, "Jazz")].into_iter().collect();
        LoftyCodec.write_tags(&path, &first, true).unwrap();

        let second: Tags = [(keys::ALBUM, "Album")].into_iter().collect();
        LoftyCodec.write_tags(&path, &second, true).unwrap();

        let tags = LoftyCodec.read_tags(&path).unwrap();
        assert_eq!(tags.get(keys::ALBUM), "Album");
        assert!(tags.values(keys::TITLE).is_empty());
        assert!(tags.values(keys::GENRE).is_empty());
    }

    #[test]
    fn test_write_date_replaces_year_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());
        add_cover(&path);
        assert_eq!(LoftyCodec.read_tags(&path).unwrap().values(keys::DATE), ["1999"]);

        let tags: Tags = [(keys::DATE, "2001-02-03")].into_iter().collect();
        LoftyCodec.write_tags(&path, &tags, false).unwrap();

        let tags = LoftyCodec.read_tags(&path).unwrap();
        assert_eq!(tags.values(keys::DATE), ["2001-02-03"]);
    }

    #[test]
    fn test_write_multi_valued_and_custom_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());

        let mut tags = Tags::new();
        tags.set(keys::ARTISTS, ["Alpha", "Beta"]);
        tags.add("MY_CUSTOM_KEY", "x");
        LoftyCodec.write_tags(&path, &tags, true).unwrap();

        let tags = LoftyCodec.read_tags(&path).unwrap();
        assert_eq!(tags.values(keys::ARTISTS), ["Alpha", "Beta"]);
        assert_eq!(tags.get("MY_CUSTOM_KEY"), "x");
    }

    #[test]
    fn test_write_keeps_embedded_pictures() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());
        add_cover(&path);
        assert_eq!(LoftyCodec.read_properties(&path).unwrap().embedded_images, 1);

        let tags: Tags = [(keys::TITLE, "Merged")].into_iter().collect();
        LoftyCodec.write_tags(&path, &tags, false).unwrap();
        assert_eq!(LoftyCodec.read_properties(&path).unwrap().embedded_images, 1);

        let tags: Tags = [(keys::TITLE, "Cleared")].into_iter().collect();
        LoftyCodec.write_tags(&path, &tags, true).unwrap();
        assert_eq!(LoftyCodec.read_properties(&path).unwrap().embedded_images, 1);
        assert_eq!(LoftyCodec.read_tags(&path).unwrap().get(keys::TITLE), "Cleared");
    }

    #[test]
    fn test_read_properties_of_flac() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_flac(dir.path());

        let props = LoftyCodec.read_properties(&path).unwrap();
        assert_eq!(props.sample_rate, Some(44_100));
        assert_eq!(props.channels, Some(2));
        assert_eq!(props.embedded_images, 0);
    }

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("/a/01 Track.flac")));
        assert!(is_audio_file(Path::new("/a/01 Track.MP3")));
        assert!(!is_audio_file(Path::new("/a/cover.jpg")));
        assert!(!is_audio_file(Path::new("/a/notes")));
    }
}
