//! A music library manager: a directory of managed media files plus a JSON
//! catalog of songs, playlists and exports.
//!
//! Core modules:
//! - [`catalog`] - The persisted library aggregate (load, add, remove, save)
//! - [`song`] - Song records and metadata values
//! - [`playlist`] - Simple and rule-driven playlists, M3U rendering
//! - [`condition`] - The condition tree behind auto playlists
//! - [`export`] - Flat symlink directories for devices and players
//!
//! ### Supporting Modules
//!
//! - [`batch`] - Adding many files and directory trees at once
//! - [`import`] - Reading other players' libraries (Banshee)
//! - [`tags`] - Audio tag extraction
//! - [`fsutil`] - Guarded directory clearing and symlinks
//! - [`config`] - Library layout constants and root discovery
//! - [`error`] - Library error type
//! - [`cli`], [`commands`], [`completion`] - The `musicman` binary
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use musicman::catalog::Catalog;
//! use musicman::condition::{Condition, Operator, RuleValue};
//! use musicman::playlist::{AutoPlaylist, Playlist};
//! use musicman::tags::LoftyTagReader;
//! use std::path::Path;
//!
//! let mut catalog = Catalog::find(Path::new("."))?;
//! catalog.add(
//!     Path::new("/tmp/Televisor - Old Skool.flac"),
//!     chrono::Local::now().naive_local(),
//!     false,
//!     &LoftyTagReader::new(),
//! )?;
//!
//! let rule = Condition::leaf("artist", Operator::Is, RuleValue::text("televisor"))?;
//! let playlist = Playlist::Auto(AutoPlaylist::new(vec![rule], vec!["title".into()]));
//! for line in playlist.get_m3u(&catalog) {
//!     println!("{line}");
//! }
//!
//! catalog.playlists.insert("televisor".into(), playlist);
//! catalog.save()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Library Layout
//!
//! A library is any directory holding a `musicman.json` catalog and a
//! `music/` directory. Every catalog song corresponds to one file in
//! `music/`, named by [`catalog::gen_filename`]. Commands find the library
//! by walking up from the working directory.

pub mod batch;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod completion;
pub mod condition;
pub mod config;
pub mod error;
pub mod export;
pub mod fsutil;
pub mod import;
pub mod playlist;
pub mod song;
pub mod tags;

pub use catalog::Catalog;
pub use error::{Error, Result};
pub use song::Song;
