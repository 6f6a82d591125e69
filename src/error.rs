//! # Error Module
//!
//! Typed errors raised by the catalog core. The command-line front-end wraps
//! these in `anyhow` with extra context; library code never decides how an
//! error is presented.
//!
//! Errors fall into three groups:
//!
//! - **Configuration**: the catalog file cannot be turned into a valid
//!   catalog (parse failures, unknown `type` discriminators, dangling
//!   playlist references, malformed condition nodes). Loading aborts.
//! - **Filesystem**: copy/move/symlink failures and directory safety
//!   violations. The current operation aborts, in-memory state is kept.
//! - **Tags**: see [`crate::tags::TagError`]. Never fatal for the catalog.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no musicman library exists at or above {}", .0.display())]
    NotALibrary(PathBuf),

    #[error("failed to parse catalog file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} `{name}` has unknown type `{found}`")]
    UnknownVariant {
        kind: &'static str,
        name: String,
        found: String,
    },

    #[error("{kind} `{name}` is missing field `{field}`")]
    MissingField {
        kind: &'static str,
        name: String,
        field: &'static str,
    },

    #[error("{kind} `{name}`: invalid field `{field}`: {source}")]
    InvalidField {
        kind: &'static str,
        name: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("song entry `{key}` declares filename `{filename}`")]
    SongKeyMismatch { key: String, filename: String },

    #[error("playlist `{playlist}` references unknown song `{filename}`")]
    DanglingReference { playlist: String, filename: String },

    #[error("playlist `{playlist}`: malformed condition at {location}: {reason}")]
    MalformedCondition {
        playlist: String,
        location: String,
        reason: String,
    },

    #[error("failed to serialize catalog {}: {source}", .path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("a song named `{0}` already exists in the library")]
    FilenameCollision(String),

    #[error("cannot generate a filename for {}", .0.display())]
    InvalidFilename(PathBuf),

    #[error("no song named `{0}` in the library")]
    UnknownSong(String),

    #[error("invalid playlist name `{0}`")]
    InvalidPlaylistName(String),

    #[error("parent directory doesn't exist: {}", .0.display())]
    MissingParent(PathBuf),

    #[error("path exists but isn't a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("refusing to delete {what} {} while emptying {}", .entry.display(), .dir.display())]
    RefusingToDelete {
        what: &'static str,
        entry: PathBuf,
        dir: PathBuf,
    },

    #[error("refusing to export into {}: {reason}", .dir.display())]
    UnsafeExportDir { dir: PathBuf, reason: String },

    #[error("{action} failed for {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read import source {}: {source}", .path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    /// Wraps an I/O error with the action and path it happened on.
    pub fn io(action: &'static str, path: &Path, source: io::Error) -> Self {
        Error::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether this error stems from the catalog file contents rather than
    /// the filesystem.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. }
                | Error::UnknownVariant { .. }
                | Error::MissingField { .. }
                | Error::InvalidField { .. }
                | Error::SongKeyMismatch { .. }
                | Error::DanglingReference { .. }
                | Error::MalformedCondition { .. }
        )
    }
}

/// Extension trait mirroring `anyhow::Context` for `io::Result`.
pub(crate) trait IoContext<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn with_path(self, action: &'static str, path: &Path) -> Result<T> {
        self.map_err(|source| Error::io(action, path, source))
    }
}
