//! # Import Module
//!
//! Reads other players' libraries and turns them into add candidates. The
//! catalog never touches the foreign library; it only consumes the
//! candidates through the regular batch add path.
//!
//! ## Supported Sources
//!
//! - **Banshee**: `banshee.db` (SQLite), table `CoreTracks`. Only local
//!   `file://` tracks are imported; their `DateAddedStamp` becomes the song's
//!   date added.

use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDateTime};
use log::{debug, warn};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// A file to add, with the date it was originally added to the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportCandidate {
    pub path: PathBuf,
    pub date_added: NaiveDateTime,
}

/// Banshee library reader.
pub mod banshee {
    use super::*;

    /// Database file inside a Banshee configuration directory.
    pub const DB_FILENAME: &str = "banshee.db";

    const FILE_PROTOCOL: &str = "file://";

    /// Path of the Banshee database inside `dir`.
    pub fn db_path(dir: &Path) -> PathBuf {
        dir.join(DB_FILENAME)
    }

    /// Reads every local track of the Banshee database at `db`.
    pub fn read_candidates(db: &Path) -> Result<Vec<ImportCandidate>> {
        let import_err = |source| Error::Import {
            path: db.to_path_buf(),
            source,
        };

        let conn = Connection::open_with_flags(db, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(import_err)?;
        let mut stmt = conn
            .prepare("SELECT Uri, DateAddedStamp FROM CoreTracks")
            .map_err(import_err)?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<i64>>(1)?))
            })
            .map_err(import_err)?;

        let mut candidates = Vec::new();
        for row in rows {
            let (uri, stamp) = row.map_err(import_err)?;

            let Some(path) = uri_to_path(&uri) else {
                debug!("Skipping non-local track `{uri}`");
                continue;
            };

            let Some(date_added) = stamp.and_then(local_time) else {
                warn!("Track `{uri}` has no usable date added, skipping");
                continue;
            };

            candidates.push(ImportCandidate { path, date_added });
        }

        debug!("Read {} candidates from {}", candidates.len(), db.display());
        Ok(candidates)
    }

    /// Local filesystem path of a `file://` URI.
    pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
        let encoded = uri.strip_prefix(FILE_PROTOCOL)?;
        let decoded = urlencoding::decode(encoded).ok()?;
        Some(PathBuf::from(decoded.into_owned()))
    }

    fn local_time(stamp: i64) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(stamp, 0).map(|utc| utc.with_timezone(&Local).naive_local())
    }
}
