//! # Catalog Module
//!
//! The persisted aggregate of one library: its songs, playlists and export
//! configurations, plus the managed `music/` directory the songs live in.
//!
//! ## Catalog File
//!
//! `musicman.json` at the library root:
//!
//! ```text
//! {
//!     "extensions": ["mp3", "flac"],
//!     "songs": {
//!         "01-Old-Skool.flac": {
//!             "filename": "01-Old-Skool.flac",
//!             "date_added": "2015-06-01T18:22:10",
//!             "metadata": {"artist": "Televisor", "length": 254}
//!         }
//!     },
//!     "exports": {"car": {"type": "flatdir", "music_dir": "...", "playlist_dir": "..."}},
//!     "playlists": {"favs": {"type": "simple", "songs": ["01-Old-Skool.flac"]}}
//! }
//! ```
//!
//! Every top-level field is optional when loading. Saving goes through a
//! temporary file in the library root followed by an atomic rename, so an
//! interrupted save never corrupts the previous catalog.
//!
//! ## Known Limitation
//!
//! There is no file locking. Running two musicman processes against the same
//! library at once is undefined behaviour: the last save wins and managed
//! files may be copied over each other.

use crate::config::{self, FILENAME_CONFIG, FILENAME_MUSIC};
use crate::error::{Error, IoContext, Result};
use crate::export::Export;
use crate::playlist::Playlist;
use crate::song::Song;
use crate::tags::{TagError, TagReader};
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of a successful [`Catalog::add`].
#[derive(Debug)]
pub struct AddedSong {
    pub filename: String,
    /// Set when tags couldn't be read; the song was added with empty
    /// metadata.
    pub tag_warning: Option<TagError>,
}

/// A library catalog.
///
/// Every instance owns its own collections; nothing is shared between
/// catalogs.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    path: PathBuf,
    pub extensions: Vec<String>,
    songs: BTreeMap<String, Song>,
    pub exports: BTreeMap<String, Export>,
    pub playlists: BTreeMap<String, Playlist>,
}

/// On-disk shape used when reading. Exports and playlists stay raw JSON so
/// their `type` discriminator can be dispatched with typed errors.
#[derive(Deserialize)]
struct RawCatalog {
    extensions: Option<Vec<String>>,
    #[serde(default)]
    songs: BTreeMap<String, Song>,
    #[serde(default)]
    exports: BTreeMap<String, Value>,
    #[serde(default)]
    playlists: BTreeMap<String, Value>,
}

/// On-disk shape used when writing.
#[derive(Serialize)]
struct CatalogFile<'a> {
    extensions: &'a [String],
    songs: &'a BTreeMap<String, Song>,
    exports: &'a BTreeMap<String, Export>,
    playlists: &'a BTreeMap<String, Playlist>,
}

impl Catalog {
    /// An empty catalog rooted at `path`, with the default extensions.
    ///
    /// The root is made absolute against the working directory, so song
    /// paths, export symlinks and M3U entries never depend on where they
    /// are read from.
    pub fn new(path: &Path) -> Result<Self> {
        let path = path
            .absolutize()
            .with_path("resolve library root", path)?
            .into_owned();

        Ok(Self {
            path,
            extensions: config::DEFAULT_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            songs: BTreeMap::new(),
            exports: BTreeMap::new(),
            playlists: BTreeMap::new(),
        })
    }

    /// Sets up a new library at `path`: creates the `music/` directory and
    /// returns an empty catalog. Call [`Catalog::save`] to write the
    /// catalog file.
    pub fn init(path: &Path) -> Result<Self> {
        let catalog = Self::new(path)?;
        let music = catalog.music_path();

        if music.is_dir() {
            warn!("`{FILENAME_MUSIC}` directory already existed, ignoring...");
        } else {
            fs::create_dir_all(&music).with_path("create directory", &music)?;
        }

        info!("Initialized library at {}", path.display());
        Ok(catalog)
    }

    /// Loads the catalog of the library rooted at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let config_path = path.join(FILENAME_CONFIG);
        let text = fs::read_to_string(&config_path).with_path("read catalog", &config_path)?;
        let catalog = Self::from_json(path, &text)?;

        debug!(
            "Loaded {} songs, {} playlists, {} exports from {}",
            catalog.songs.len(),
            catalog.playlists.len(),
            catalog.exports.len(),
            config_path.display()
        );
        Ok(catalog)
    }

    /// Finds the library containing `start` (or one of its ancestors) and
    /// loads it.
    pub fn find(start: &Path) -> Result<Self> {
        let root = config::find_library_root(start)
            .ok_or_else(|| Error::NotALibrary(start.to_path_buf()))?;
        Self::load(&root)
    }

    /// Parses catalog file contents for a library rooted at `path`.
    ///
    /// Fails on the first invalid record; there is no partial result.
    pub fn from_json(path: &Path, text: &str) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(text).map_err(|source| Error::Parse {
            path: path.join(FILENAME_CONFIG),
            source,
        })?;

        let mut catalog = Self::new(path)?;
        if let Some(extensions) = raw.extensions {
            catalog.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        }

        for (key, song) in &raw.songs {
            if *key != song.filename {
                return Err(Error::SongKeyMismatch {
                    key: key.clone(),
                    filename: song.filename.clone(),
                });
            }
        }
        catalog.songs = raw.songs;

        for (name, config) in &raw.exports {
            catalog.exports.insert(name.clone(), Export::from_config(name, config)?);
        }

        for (name, config) in &raw.playlists {
            let playlist = Playlist::from_config(name, config)?;
            if let Playlist::Simple(simple) = &playlist {
                if let Some(missing) = simple.songs.iter().find(|f| !catalog.songs.contains_key(*f)) {
                    return Err(Error::DanglingReference {
                        playlist: name.clone(),
                        filename: missing.clone(),
                    });
                }
            }
            catalog.playlists.insert(name.clone(), playlist);
        }

        Ok(catalog)
    }

    /// The catalog in its persisted form.
    pub fn to_json(&self) -> Result<String> {
        let file = CatalogFile {
            extensions: &self.extensions,
            songs: &self.songs,
            exports: &self.exports,
            playlists: &self.playlists,
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        file.serialize(&mut ser).map_err(|source| Error::Serialize {
            path: self.config_path(),
            source,
        })?;
        buf.push(b'\n');

        // serde_json only emits UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Writes the catalog file atomically: the new contents go to a
    /// temporary file next to the catalog, which then replaces it.
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path();
        let contents = self.to_json()?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".musicman-")
            .suffix(".json.tmp")
            .tempfile_in(&self.path)
            .with_path("create temporary file", &self.path)?;
        tmp.write_all(contents.as_bytes())
            .with_path("write catalog", tmp.path())?;
        tmp.as_file()
            .sync_all()
            .with_path("sync catalog", tmp.path())?;
        tmp.persist(&config_path)
            .map_err(|e| Error::io("replace catalog", &config_path, e.error))?;

        debug!("Saved catalog to {}", config_path.display());
        Ok(())
    }

    /// Adds the file at `source` to the library.
    ///
    /// The file is copied (or moved, with `move_file`) into the managed
    /// directory under a sanitized name. An existing song or file with that
    /// name is a [`Error::FilenameCollision`]; nothing is overwritten. The
    /// catalog is only changed once the file is in place. Unreadable tags
    /// are not an error: the song is added with empty metadata and the
    /// failure is returned in [`AddedSong::tag_warning`].
    pub fn add(
        &mut self,
        source: &Path,
        date_added: NaiveDateTime,
        move_file: bool,
        tags: &dyn TagReader,
    ) -> Result<AddedSong> {
        let filename = gen_filename(source).ok_or_else(|| Error::InvalidFilename(source.to_path_buf()))?;
        let dest = self.song_path(&filename);

        if self.songs.contains_key(&filename) || dest.symlink_metadata().is_ok() {
            return Err(Error::FilenameCollision(filename));
        }

        if move_file {
            move_into(source, &dest)?;
        } else {
            fs::copy(source, &dest).with_path("copy", source)?;
        }

        let mut song = Song::new(filename.clone(), date_added);
        let tag_warning = match tags.read_tags(&dest) {
            Ok(metadata) => {
                song.metadata = metadata;
                None
            }
            Err(e) => {
                warn!("{e}");
                Some(e)
            }
        };

        self.songs.insert(filename.clone(), song);
        info!("Added song `{}` as `{filename}`", source.display());

        Ok(AddedSong {
            filename,
            tag_warning,
        })
    }

    /// Removes a song record and its Simple playlist entries. The media
    /// file in `music/` is left alone.
    pub fn remove(&mut self, filename: &str) -> Result<Song> {
        let song = self
            .songs
            .remove(filename)
            .ok_or_else(|| Error::UnknownSong(filename.to_string()))?;

        for (name, playlist) in self.playlists.iter_mut() {
            if let Playlist::Simple(simple) = playlist {
                let before = simple.songs.len();
                simple.songs.retain(|f| f != filename);
                if simple.songs.len() != before {
                    debug!("Dropped `{filename}` from playlist `{name}`");
                }
            }
        }

        info!("Removed song `{filename}`");
        Ok(song)
    }

    /// Re-reads tags for every song. Failures are logged and returned; the
    /// affected songs keep their current metadata.
    pub fn update_metadata(&mut self, tags: &dyn TagReader) -> Vec<TagError> {
        let music = self.music_path();
        let mut failures = Vec::new();

        for song in self.songs.values_mut() {
            match tags.read_tags(&music.join(&song.filename)) {
                Ok(metadata) => song.merge_metadata(metadata),
                Err(e) => {
                    warn!("{e}");
                    failures.push(e);
                }
            }
        }

        failures
    }

    /// Inserts a song record as-is, replacing any song with the same
    /// filename. Does not touch the filesystem.
    pub fn insert_song(&mut self, song: Song) {
        self.songs.insert(song.filename.clone(), song);
    }

    pub fn get_song(&self, filename: &str) -> Option<&Song> {
        self.songs.get(filename)
    }

    /// All songs, ordered by filename.
    pub fn songs(&self) -> impl Iterator<Item = &Song> {
        self.songs.values()
    }

    pub fn song_count(&self) -> usize {
        self.songs.len()
    }

    /// Whether `ext` (without the dot, any case) is an accepted extension.
    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join(FILENAME_CONFIG)
    }

    pub fn music_path(&self) -> PathBuf {
        self.path.join(FILENAME_MUSIC)
    }

    pub fn song_path(&self, filename: &str) -> PathBuf {
        self.music_path().join(filename)
    }
}

/// Generates a library filename for `path`: spaces in the stem become `-`
/// and anything outside `[A-Za-z0-9_-]` is dropped. The extension is kept
/// as-is. Returns `None` when nothing of the stem survives.
///
/// ```
/// use musicman::catalog::gen_filename;
/// use std::path::Path;
///
/// let name = gen_filename(Path::new("~/Music/Televisor/01. Old Skool (Nitro Fun Remix).flac"));
/// assert_eq!(name.as_deref(), Some("01-Old-Skool-Nitro-Fun-Remix.flac"));
/// ```
pub fn gen_filename(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy();
    let stem: String = stem
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();

    if stem.is_empty() {
        return None;
    }

    match path.extension() {
        Some(ext) => Some(format!("{stem}.{}", ext.to_string_lossy())),
        None => Some(stem),
    }
}

/// Moves a file, falling back to copy + delete across filesystems.
fn move_into(source: &Path, dest: &Path) -> Result<()> {
    if fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    fs::copy(source, dest).with_path("move", source)?;
    if let Err(e) = fs::remove_file(source) {
        // keep the catalog consistent with the managed copy we just made
        let _ = fs::remove_file(dest);
        return Err(Error::io("move", source, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{timestamp, MetaValue, Metadata};
    use tempfile::TempDir;

    struct FixedTags(Option<Metadata>);

    impl TagReader for FixedTags {
        fn read_tags(&self, path: &Path) -> std::result::Result<Metadata, TagError> {
            self.0.clone().ok_or_else(|| TagError::new(path, "no tags"))
        }
    }

    fn now() -> NaiveDateTime {
        timestamp::parse("2016-02-03T04:05:06").unwrap()
    }

    fn library() -> (TempDir, Catalog) {
        let dir = TempDir::new().unwrap();
        let catalog = Catalog::init(dir.path()).unwrap();
        (dir, catalog)
    }

    #[test]
    fn test_gen_filename_examples() {
        assert_eq!(
            gen_filename(Path::new("/x/01. Old Skool (Nitro Fun Remix).flac")).as_deref(),
            Some("01-Old-Skool-Nitro-Fun-Remix.flac")
        );
        assert_eq!(gen_filename(Path::new("Beyoncé – Halo.MP3")).as_deref(), Some("Beyonc--Halo.MP3"));
        assert_eq!(gen_filename(Path::new("no_ext")).as_deref(), Some("no_ext"));
        assert_eq!(gen_filename(Path::new("/x/!!!.mp3")), None);
    }

    #[test]
    fn test_gen_filename_is_idempotent() {
        for input in ["a b c.mp3", "01. Track (Live).flac", "x.y.z.ogg", "über_song.m4a"] {
            let once = gen_filename(Path::new(input)).unwrap();
            let twice = gen_filename(Path::new(&once)).unwrap();
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn test_add_copies_and_reads_tags() {
        let (dir, mut catalog) = library();
        let source = dir.path().join("My Song.mp3");
        fs::write(&source, "audio").unwrap();

        let mut tags = Metadata::new();
        tags.insert("artist".into(), MetaValue::from("Blur"));
        let added = catalog.add(&source, now(), false, &FixedTags(Some(tags))).unwrap();

        assert_eq!(added.filename, "My-Song.mp3");
        assert!(added.tag_warning.is_none());
        assert!(source.is_file());
        assert!(catalog.song_path("My-Song.mp3").is_file());
        let song = catalog.get_song("My-Song.mp3").unwrap();
        assert_eq!(song.date_added, now());
        assert_eq!(song.attr("artist"), Some(MetaValue::from("Blur")));
    }

    #[test]
    fn test_add_move_removes_source() {
        let (dir, mut catalog) = library();
        let source = dir.path().join("moved.flac");
        fs::write(&source, "audio").unwrap();

        catalog.add(&source, now(), true, &FixedTags(None)).unwrap();
        assert!(!source.exists());
        assert!(catalog.song_path("moved.flac").is_file());
    }

    #[test]
    fn test_add_with_unreadable_tags_is_soft_failure() {
        let (dir, mut catalog) = library();
        let source = dir.path().join("song.mp3");
        fs::write(&source, "audio").unwrap();

        let added = catalog.add(&source, now(), false, &FixedTags(None)).unwrap();
        assert!(added.tag_warning.is_some());
        assert!(catalog.get_song("song.mp3").unwrap().metadata.is_empty());
    }

    #[test]
    fn test_add_collision_is_rejected() {
        let (dir, mut catalog) = library();
        let first = dir.path().join("a song.mp3");
        let second = dir.path().join("a-song.mp3");
        fs::write(&first, "first").unwrap();
        fs::write(&second, "second").unwrap();

        catalog.add(&first, now(), false, &FixedTags(None)).unwrap();
        let err = catalog.add(&second, now(), false, &FixedTags(None)).unwrap_err();
        assert!(matches!(err, Error::FilenameCollision(ref f) if f == "a-song.mp3"));
        assert_eq!(fs::read_to_string(catalog.song_path("a-song.mp3")).unwrap(), "first");
        assert_eq!(catalog.song_count(), 1);
    }

    #[test]
    fn test_add_io_failure_leaves_catalog_unchanged() {
        let (dir, mut catalog) = library();
        let err = catalog
            .add(&dir.path().join("missing.mp3"), now(), false, &FixedTags(None))
            .unwrap_err();
        assert!(matches!(err, Error::Io { action: "copy", .. }));
        assert_eq!(catalog.song_count(), 0);
    }

    #[test]
    fn test_remove_keeps_file_and_drops_playlist_refs() {
        let (dir, mut catalog) = library();
        let source = dir.path().join("keep.mp3");
        fs::write(&source, "audio").unwrap();
        catalog.add(&source, now(), false, &FixedTags(None)).unwrap();
        catalog.playlists.insert(
            "mix".into(),
            Playlist::Simple(crate::playlist::SimplePlaylist::new(vec!["keep.mp3".into()])),
        );

        catalog.remove("keep.mp3").unwrap();
        assert!(catalog.song_path("keep.mp3").is_file());
        assert!(catalog.get_song("keep.mp3").is_none());
        assert!(!catalog.playlists["mix"].references("keep.mp3"));
        assert!(matches!(catalog.remove("keep.mp3"), Err(Error::UnknownSong(_))));
    }

    #[test]
    fn test_load_defaults_missing_fields() {
        let catalog = Catalog::from_json(Path::new("/lib"), "{}").unwrap();
        assert_eq!(catalog.extensions, config::DEFAULT_EXTENSIONS);
        assert_eq!(catalog.song_count(), 0);
        assert!(catalog.playlists.is_empty());
        assert!(catalog.exports.is_empty());
    }

    #[test]
    fn test_load_rejects_dangling_reference() {
        let text = r#"{
            "songs": {"a.mp3": {"filename": "a.mp3", "date_added": "2015-01-01T00:00:00"}},
            "playlists": {"mix": {"type": "simple", "songs": ["a.mp3", "b.mp3"]}}
        }"#;
        let err = Catalog::from_json(Path::new("/lib"), text).unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingReference { ref playlist, ref filename } if playlist == "mix" && filename == "b.mp3"
        ));
    }

    #[test]
    fn test_load_rejects_unknown_export_type() {
        let text = r#"{"exports": {"old": {"type": "banshee", "music_dir": "/x"}}}"#;
        let err = Catalog::from_json(Path::new("/lib"), text).unwrap_err();
        assert!(matches!(err, Error::UnknownVariant { kind: "export", .. }));
    }

    #[test]
    fn test_load_rejects_mismatched_song_key() {
        let text = r#"{"songs": {"a.mp3": {"filename": "b.mp3", "date_added": "2015-01-01"}}}"#;
        assert!(matches!(
            Catalog::from_json(Path::new("/lib"), text),
            Err(Error::SongKeyMismatch { .. })
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let err = Catalog::from_json(Path::new("/lib"), "{\"songs\": [").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_save_is_atomic_and_loadable() {
        let (_dir, mut catalog) = library();
        catalog.extensions.push("ogg".into());
        catalog.insert_song(Song::new("x.ogg", now()));
        catalog.save().unwrap();

        let leftovers: Vec<_> = fs::read_dir(catalog.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        let loaded = Catalog::load(catalog.path()).unwrap();
        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_catalogs_do_not_share_collections() {
        let mut a = Catalog::new(Path::new("/a")).unwrap();
        let b = Catalog::new(Path::new("/b")).unwrap();
        a.insert_song(Song::new("x.mp3", now()));
        a.extensions.clear();
        assert_eq!(b.song_count(), 0);
        assert_eq!(b.extensions.len(), config::DEFAULT_EXTENSIONS.len());
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let cwd = std::env::current_dir().unwrap();
        let catalog = Catalog::new(Path::new("rel/./lib")).unwrap();

        assert_eq!(catalog.path(), cwd.join("rel/lib"));
        assert!(catalog.song_path("a.mp3").is_absolute());
        assert_eq!(catalog.config_path(), cwd.join("rel/lib").join(FILENAME_CONFIG));
    }

    #[test]
    fn test_find_walks_up() {
        let (_dir, catalog) = library();
        catalog.save().unwrap();
        let found = Catalog::find(&catalog.music_path()).unwrap();
        assert_eq!(found.path(), catalog.path());
    }
}
