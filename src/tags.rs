//! # Tag Extraction Module
//!
//! Reads embedded media tags and normalizes them to the small key set the
//! catalog understands: `title`, `artist`, `album`, `tracknumber`, `date`,
//! `genre`, `composer` and `length` (whole seconds).
//!
//! The catalog only talks to the [`TagReader`] trait, so callers and tests can
//! substitute their own reader. [`LoftyTagReader`] is the default.

use crate::song::{MetaValue, Metadata};
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use log::debug;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Tags could not be read. Always recoverable: the song is kept with
/// whatever metadata it already had.
#[derive(Debug, Error)]
#[error("unable to read tags from {}: {reason}", .path.display())]
pub struct TagError {
    pub path: PathBuf,
    pub reason: String,
}

impl TagError {
    pub fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Source of normalized metadata for a media file.
pub trait TagReader {
    fn read_tags(&self, path: &Path) -> Result<Metadata, TagError>;
}

/// Normalized keys produced by [`LoftyTagReader`], besides `length`.
pub const TAG_KEYS: [&str; 7] = [
    "artist",
    "title",
    "album",
    "tracknumber",
    "date",
    "genre",
    "composer",
];

/// Tag items to try for a normalized key, first match wins.
fn item_keys(key: &str) -> Vec<ItemKey> {
    match key {
        "artist" => vec![
            ItemKey::TrackArtist,
            ItemKey::Performer,
            ItemKey::AlbumArtist,
            ItemKey::Composer,
        ],
        "title" => vec![ItemKey::TrackTitle],
        "album" => vec![ItemKey::AlbumTitle],
        "tracknumber" => vec![ItemKey::TrackNumber],
        "date" => vec![ItemKey::RecordingDate],
        "genre" => vec![ItemKey::Genre],
        "composer" => vec![ItemKey::Composer],
        _ => Vec::new(),
    }
}

/// [`TagReader`] backed by the `lofty` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

impl LoftyTagReader {
    pub fn new() -> Self {
        Self
    }
}

impl TagReader for LoftyTagReader {
    fn read_tags(&self, path: &Path) -> Result<Metadata, TagError> {
        let tagged = Probe::open(path)
            .map_err(|e| TagError::new(path, e.to_string()))?
            .read()
            .map_err(|e| TagError::new(path, e.to_string()))?;

        let mut tags = match tagged.primary_tag().or_else(|| tagged.first_tag()) {
            Some(tag) => normalize(tag),
            None => Metadata::new(),
        };

        let seconds = tagged.properties().duration().as_secs();
        if seconds > 0 {
            tags.insert("length".to_string(), MetaValue::Integer(seconds as i64));
        }

        debug!("Read {} tags from {}", tags.len(), path.display());
        Ok(tags)
    }
}

fn normalize(tag: &Tag) -> Metadata {
    let mut tags = Metadata::new();

    for key in TAG_KEYS {
        let found = item_keys(key)
            .iter()
            .filter_map(|item| tag.get_string(item))
            .map(str::trim)
            .find(|value| !value.is_empty());

        if let Some(value) = found {
            tags.insert(key.to_string(), MetaValue::Text(value.to_string()));
        }
    }

    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_prefers_first_matching_item() {
        let mut tag = Tag::new(TagType::VorbisComments);
        tag.insert_text(ItemKey::AlbumArtist, "Various".to_string());
        tag.insert_text(ItemKey::Performer, "Damon Albarn".to_string());
        tag.insert_text(ItemKey::TrackTitle, "  Feel Good Inc  ".to_string());
        tag.insert_text(ItemKey::Genre, "Alternative".to_string());

        let tags = normalize(&tag);
        assert_eq!(tags.get("artist"), Some(&MetaValue::from("Damon Albarn")));
        assert_eq!(tags.get("title"), Some(&MetaValue::from("Feel Good Inc")));
        assert_eq!(tags.get("genre"), Some(&MetaValue::from("Alternative")));
        assert!(!tags.contains_key("album"));
    }

    #[test]
    fn test_unreadable_file_is_typed_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-audio.flac");
        fs::write(&path, b"definitely not a flac stream").unwrap();

        let err = LoftyTagReader::new().read_tags(&path).unwrap_err();
        assert_eq!(err.path, path);
    }

    #[test]
    fn test_missing_file_is_typed_error() {
        let err = LoftyTagReader::new()
            .read_tags(Path::new("/nonexistent/musicman/song.flac"))
            .unwrap_err();
        assert!(err.to_string().contains("song.flac"));
    }
}
