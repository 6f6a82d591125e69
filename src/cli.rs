//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for musicman using Clap
//! derive macros. Every command operates on the library containing the
//! working directory, or on `--library` / `MUSICMAN_LIBRARY` when given.
//!
//! ## Commands
//!
//! - `init`: Create a new library in the working directory
//! - `status`: Summarize the library
//! - `add`: Copy (or move) music files into the library
//! - `remove`: Forget songs (files stay on disk)
//! - `playlist`: Create, inspect and delete playlists
//! - `export`: Configure and run exports
//! - `update-metadata`: Re-read tags of every song
//! - `import`: Add songs from another player's library
//! - `vi`: Edit the catalog file with validation
//!
//! ## Examples
//!
//! ```bash
//! musicman init
//! musicman add -r ~/Downloads/album
//! musicman playlist new favourites
//! musicman export
//! ```

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "musicman")]
#[command(about = "Manage musicman libraries")]
#[command(after_help = "Try command --help to see required arguments.")]
#[command(version)]
pub struct Args {
    /// Library root to use instead of searching upwards from the working
    /// directory
    #[arg(long, global = true, env = "MUSICMAN_LIBRARY", value_hint = clap::ValueHint::DirPath)]
    pub library: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new library in the working directory
    Init,

    /// Print information about the library
    Status,

    /// Add music files to the library
    ///
    /// Files are copied into the library's `music/` directory under a
    /// sanitized name. Directories are descended into (after asking, unless
    /// `-r` is given).
    Add {
        /// Path to file(s) or directories to add
        #[arg(required = true, value_hint = clap::ValueHint::AnyPath)]
        paths: Vec<PathBuf>,

        /// Recurse into directories without prompting
        #[arg(short = 'r', long)]
        recurse: bool,

        /// Move files into the library instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        /// When the songs were added (ISO-8601), defaults to now
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDateTime>,

        /// Don't check file extensions against the library's allowed list
        #[arg(long)]
        skip_check_extension: bool,

        /// Never ask about files with unexpected extensions, skip them
        #[arg(long)]
        no_bad_extensions: bool,
    },

    /// Remove songs from the catalog
    ///
    /// Only the catalog records are removed; the files stay in `music/`.
    Remove {
        /// Catalog filenames of the songs to remove
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },

    /// Run all exports, or manage export configurations
    Export {
        #[command(subcommand)]
        action: Option<ExportAction>,
    },

    /// Re-read tags for every song in the library
    UpdateMetadata,

    /// Import a library from another player without modifying it
    Import {
        #[command(subcommand)]
        source: ImportSource,
    },

    /// Edit the catalog file in $VISUAL / $EDITOR, validating on save
    Vi,

    /// Debugging commands
    Debug {
        #[command(subcommand)]
        action: DebugAction,
    },

    /// Generate shell completions
    ///
    /// Usage: musicman completion bash > ~/.local/share/bash-completion/completions/musicman
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Playlist management actions
#[derive(Subcommand, Debug)]
pub enum PlaylistAction {
    /// Create a new playlist
    New {
        /// Playlist name (also used as the exported file name)
        name: String,

        /// Create an auto playlist (rules and sorting) instead of a simple one
        #[arg(long)]
        auto: bool,
    },

    /// List playlists
    List,

    /// Print a playlist as M3U
    Show {
        name: String,
    },

    /// Append songs to a simple playlist
    Append {
        name: String,

        /// Catalog filenames to append
        #[arg(required = true)]
        filenames: Vec<String>,
    },

    /// Delete a playlist
    Delete {
        name: String,
    },
}

/// Export actions
#[derive(Subcommand, Debug)]
pub enum ExportAction {
    /// Run all exports (the default)
    Run,

    /// Configure a flat-directory export (symlinks + M3U files)
    NewFlatdir {
        name: String,

        /// Directory receiving one symlink per song
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        music_dir: PathBuf,

        /// Directory receiving one .m3u file per playlist
        #[arg(long, value_hint = clap::ValueHint::DirPath)]
        playlist_dir: PathBuf,
    },

    /// List configured exports
    List,

    /// Delete an export configuration (exported files are left alone)
    Delete {
        name: String,
    },
}

/// Supported import sources
#[derive(Subcommand, Debug)]
pub enum ImportSource {
    /// Import from a Banshee library
    Banshee {
        /// Banshee directory containing `banshee.db` (default: ~/.config/banshee-1)
        #[arg(value_hint = clap::ValueHint::DirPath)]
        dir: Option<PathBuf>,

        /// Skip files with unexpected extensions instead of asking
        #[arg(long)]
        no_bad_extensions: bool,
    },
}

/// Debugging actions
#[derive(Subcommand, Debug)]
pub enum DebugAction {
    /// Print the serialized catalog
    Dump,

    /// Load and save the catalog without making changes
    Save,
}

fn parse_date(raw: &str) -> Result<NaiveDateTime, String> {
    crate::song::timestamp::parse(raw).ok_or_else(|| format!("invalid ISO-8601 date `{raw}`"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_add_flags() {
        let args = Args::try_parse_from([
            "musicman",
            "add",
            "-r",
            "--date",
            "2015-06-01T10:00:00",
            "--no-bad-extensions",
            "a.mp3",
            "dir",
        ])
        .unwrap();

        match args.command {
            Command::Add {
                paths,
                recurse,
                date,
                no_bad_extensions,
                move_files,
                ..
            } => {
                assert_eq!(paths, [PathBuf::from("a.mp3"), PathBuf::from("dir")]);
                assert!(recurse);
                assert!(no_bad_extensions);
                assert!(!move_files);
                assert_eq!(date, crate::song::timestamp::parse("2015-06-01T10:00:00"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bad_date_is_rejected() {
        assert!(Args::try_parse_from(["musicman", "add", "--date", "soon", "a.mp3"]).is_err());
    }

    #[test]
    fn test_export_defaults_to_run() {
        let args = Args::try_parse_from(["musicman", "export"]).unwrap();
        assert!(matches!(args.command, Command::Export { action: None }));
    }
}
