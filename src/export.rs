//! # Export Module
//!
//! Exports materialize the catalog outside the library. The only kind today
//! is [`FlatDirExport`]: a directory of symlinks, one per song, next to a
//! directory of generated `.m3u` playlists. Useful for devices and players
//! that want a flat folder of files.
//!
//! Both target directories are owned by the export. The music directory may
//! only ever contain symlinks; finding anything else there aborts the export
//! before a single entry is deleted. Neither directory may overlap the
//! library or the other export directory.

use crate::catalog::Catalog;
use crate::error::{Error, IoContext, Result};
use crate::fsutil::{self, ClearPolicy};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// An export configuration, tagged by its `type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Export {
    #[serde(rename = "flatdir")]
    FlatDir(FlatDirExport),
}

impl Export {
    pub const FLAT_DIR: &'static str = "flatdir";

    pub fn kind(&self) -> &'static str {
        match self {
            Export::FlatDir(_) => Self::FLAT_DIR,
        }
    }

    /// Builds an export from its serialized form. The `type` field alone
    /// selects the variant.
    pub fn from_config(name: &str, config: &Value) -> Result<Export> {
        let kind = config
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField {
                kind: "export",
                name: name.to_string(),
                field: "type",
            })?;

        match kind {
            Self::FLAT_DIR => serde_json::from_value(config.clone())
                .map(Export::FlatDir)
                .map_err(|source| Error::InvalidField {
                    kind: "export",
                    name: name.to_string(),
                    field: "music_dir/playlist_dir",
                    source,
                }),
            other => Err(Error::UnknownVariant {
                kind: "export",
                name: name.to_string(),
                found: other.to_string(),
            }),
        }
    }

    pub fn update(&self, catalog: &Catalog) -> Result<ExportReport> {
        match self {
            Export::FlatDir(export) => export.update(catalog),
        }
    }
}

/// What an export run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportReport {
    pub songs: usize,
    pub playlists: usize,
}

/// Symlink farm plus one M3U file per playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatDirExport {
    /// Receives one symlink per song. Relative paths resolve against the
    /// library root.
    pub music_dir: PathBuf,
    /// Receives one `<playlist>.m3u` per playlist.
    pub playlist_dir: PathBuf,
}

impl FlatDirExport {
    pub fn new(music_dir: impl Into<PathBuf>, playlist_dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: music_dir.into(),
            playlist_dir: playlist_dir.into(),
        }
    }

    /// Resolves both directories against the library root, following
    /// symlinks, and checks them with [`check_layout`].
    pub fn target_dirs(&self, catalog: &Catalog) -> Result<(PathBuf, PathBuf)> {
        let root = fs::canonicalize(catalog.path()).with_path("resolve library root", catalog.path())?;
        let music_dir = fsutil::resolve_dir(&catalog.path().join(&self.music_dir))?;
        let playlist_dir = fsutil::resolve_dir(&catalog.path().join(&self.playlist_dir))?;

        check_layout(&root, &music_dir, &playlist_dir)?;
        Ok((music_dir, playlist_dir))
    }

    /// Rebuilds both directories from the catalog. Running it twice in a
    /// row produces the same result.
    pub fn update(&self, catalog: &Catalog) -> Result<ExportReport> {
        let (music_dir, playlist_dir) = self.target_dirs(catalog)?;

        let songs = self.update_songs(catalog, &music_dir)?;
        let playlists = self.update_playlists(catalog, &playlist_dir)?;

        info!(
            "Exported {songs} songs to {} and {playlists} playlists to {}",
            music_dir.display(),
            playlist_dir.display()
        );
        Ok(ExportReport { songs, playlists })
    }

    fn update_songs(&self, catalog: &Catalog, music_dir: &Path) -> Result<usize> {
        fsutil::ensure_empty_dir(music_dir, ClearPolicy::SymlinksOnly)?;

        let mut count = 0;
        for song in catalog.songs() {
            let target = catalog.song_path(&song.filename);
            fsutil::symlink_file(&target, &music_dir.join(&song.filename))?;
            count += 1;
        }

        debug!("Linked {count} songs into {}", music_dir.display());
        Ok(count)
    }

    fn update_playlists(&self, catalog: &Catalog, playlist_dir: &Path) -> Result<usize> {
        // validate names before clearing anything
        for name in catalog.playlists.keys() {
            check_playlist_name(name)?;
        }

        fsutil::ensure_empty_dir(playlist_dir, ClearPolicy::Everything)?;

        for (name, playlist) in &catalog.playlists {
            let path = playlist_dir.join(format!("{name}.m3u"));
            let file = fs::File::create(&path).with_path("create playlist", &path)?;
            let mut out = BufWriter::new(file);

            for line in playlist.get_m3u(catalog) {
                writeln!(out, "{line}").with_path("write playlist", &path)?;
            }
            out.flush().with_path("write playlist", &path)?;
        }

        Ok(catalog.playlists.len())
    }
}

/// Refuses export directories that would clear part of the library or each
/// other. All three paths must be absolute and in the same form.
pub fn check_layout(root: &Path, music_dir: &Path, playlist_dir: &Path) -> Result<()> {
    let unsafe_dir = |dir: &Path, reason: String| Error::UnsafeExportDir {
        dir: dir.to_path_buf(),
        reason,
    };

    for dir in [music_dir, playlist_dir] {
        if dir.starts_with(root) || root.starts_with(dir) {
            return Err(unsafe_dir(dir, format!("overlaps the library at {}", root.display())));
        }
    }

    if music_dir == playlist_dir {
        return Err(unsafe_dir(playlist_dir, "music and playlist directories are the same".into()));
    }
    if playlist_dir.starts_with(music_dir) {
        return Err(unsafe_dir(playlist_dir, "nested inside the music directory".into()));
    }
    if music_dir.starts_with(playlist_dir) {
        return Err(unsafe_dir(music_dir, "nested inside the playlist directory".into()));
    }

    Ok(())
}

/// Playlist names become file names, so they must be a single plain path
/// component.
pub fn check_playlist_name(name: &str) -> Result<()> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);

    if bad {
        Err(Error::InvalidPlaylistName(name.to_string()))
    } else {
        Ok(())
    }
}
