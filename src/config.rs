//! # Configuration Module
//!
//! Fixed names and defaults of a musicman library, plus lookup of the
//! library root and of external programs the CLI hands off to.
//!
//! ## Library Layout
//!
//! ```text
//! <root>/
//!     musicman.json   catalog file (songs, playlists, exports)
//!     music/          managed media files, one per catalog song
//! ```
//!
//! ## Runtime Overrides
//!
//! - `MUSICMAN_LIBRARY` / `--library`: library root instead of searching
//!   upwards from the working directory
//! - `VISUAL` / `EDITOR`: editor used by `musicman vi`

use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use std::env;
use std::path::{Path, PathBuf};

/// Catalog file name inside a library root.
pub const FILENAME_CONFIG: &str = "musicman.json";

/// Managed media directory inside a library root.
pub const FILENAME_MUSIC: &str = "music";

/// Extensions accepted by a new library. Each library keeps its own list.
pub const DEFAULT_EXTENSIONS: [&str; 5] = ["mp3", "mp4", "wav", "m4a", "flac"];

/// Files which are never added to a library (compared lower-cased).
pub const FILE_BLACKLIST: [&str; 4] = [
    ".ds_store",
    "thumbs.db",
    "itunes library.itl",
    "itunes music library.xml",
];

/// Whether `path` is a library root.
pub fn is_library(path: &Path) -> bool {
    path.join(FILENAME_CONFIG).is_file()
}

/// Walks up from `start` and returns the first library root found.
pub fn find_library_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find(|p| is_library(p)).map(Path::to_path_buf)
}

/// Absolute form of `path`, resolved against the working directory without
/// touching the filesystem.
pub fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Failed to resolve path {}", path.display()))?
        .into_owned())
}

/// Editor for interactive catalog editing.
pub fn default_editor() -> String {
    ["VISUAL", "EDITOR"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "vi".to_string())
}

/// Default Banshee configuration directory (`~/.config/banshee-1` on Linux).
pub fn default_banshee_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("banshee-1"))
}

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Explicit library root; `None` searches upwards from the working
    /// directory.
    pub library: Option<PathBuf>,
}

impl RuntimeConfig {
    pub fn with_library(library: Option<PathBuf>) -> Self {
        Self { library }
    }

    /// The library root this invocation operates on.
    pub fn library_root(&self) -> Result<PathBuf> {
        let start = match &self.library {
            Some(path) => absolute(path)?,
            None => env::current_dir().context("Failed to read the working directory")?,
        };

        find_library_root(&start).ok_or_else(|| {
            anyhow::Error::new(crate::Error::NotALibrary(start.clone()))
                .context("Run `musicman init` to create one")
        })
    }
}
