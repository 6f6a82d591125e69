//! # musicman
//!
//! Command-line front end of the musicman library manager. A library is a
//! directory with a `musicman.json` catalog and a `music/` directory of
//! managed files; every command operates on the library containing the
//! working directory.
//!
//! ## Usage
//!
//! ```bash
//! # Create a library and fill it
//! musicman init
//! musicman add -r ~/Downloads/album
//!
//! # Playlists and exports
//! musicman playlist new favourites
//! musicman export new-flatdir car --music-dir /mnt/car/music --playlist-dir /mnt/car/lists
//! musicman export
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::debug;
use musicman::cli::{self, Command, DebugAction, ExportAction, ImportSource, PlaylistAction};
use musicman::commands::{self, AddArgs};
use musicman::completion;
use musicman::config::RuntimeConfig;
use std::io;

/// Main entry point for musicman.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to their handlers.
///
/// # Logging
///
/// Controlled via `RUST_LOG`:
/// - `RUST_LOG=info musicman add song.mp3` - Report every added or skipped file
/// - `RUST_LOG=musicman::export=debug musicman export` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();
    let rc = RuntimeConfig::with_library(args.library);
    debug!("Running {:?}", args.command);

    match args.command {
        Command::Init => commands::init(&rc)?,
        Command::Status => commands::status(&rc)?,
        Command::Add {
            paths,
            recurse,
            move_files,
            date,
            skip_check_extension,
            no_bad_extensions,
        } => commands::add(
            &rc,
            AddArgs {
                paths,
                recurse,
                move_files,
                date,
                skip_check_extension,
                no_bad_extensions,
            },
        )?,
        Command::Remove { filenames } => commands::remove(&rc, &filenames)?,
        Command::Playlist { action } => match action {
            PlaylistAction::New { name, auto } => commands::playlist_new(&rc, &name, auto)?,
            PlaylistAction::List => commands::playlist_list(&rc)?,
            PlaylistAction::Show { name } => commands::playlist_show(&rc, &name)?,
            PlaylistAction::Append { name, filenames } => commands::playlist_append(&rc, &name, &filenames)?,
            PlaylistAction::Delete { name } => commands::playlist_delete(&rc, &name)?,
        },
        Command::Export { action } => match action.unwrap_or(ExportAction::Run) {
            ExportAction::Run => commands::export_all(&rc)?,
            ExportAction::NewFlatdir {
                name,
                music_dir,
                playlist_dir,
            } => commands::export_new_flatdir(&rc, &name, &music_dir, &playlist_dir)?,
            ExportAction::List => commands::export_list(&rc)?,
            ExportAction::Delete { name } => commands::export_delete(&rc, &name)?,
        },
        Command::UpdateMetadata => commands::update_metadata(&rc)?,
        Command::Import { source } => match source {
            ImportSource::Banshee { dir, no_bad_extensions } => {
                commands::import_banshee(&rc, dir.as_deref(), no_bad_extensions)?
            }
        },
        Command::Vi => commands::vi(&rc)?,
        Command::Debug { action } => match action {
            DebugAction::Dump => commands::debug_dump(&rc)?,
            DebugAction::Save => commands::debug_save(&rc)?,
        },
        Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(
                completion::shell_to_completion_shell(&shell),
                &mut cmd,
                &mut io::stdout(),
            );
        }
    }

    Ok(())
}
