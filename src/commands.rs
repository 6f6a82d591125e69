//! # Command Handlers
//!
//! One function per CLI command. Handlers load the catalog, call into the
//! library modules and save once at the end, so a failing command leaves
//! the catalog file as it was. Errors carry `anyhow` context for display.

use crate::batch::{self, AddOptions, AddPrompt, AddSummary};
use crate::catalog::Catalog;
use crate::config::{self, RuntimeConfig, FILENAME_CONFIG};
use crate::export::{self, Export, FlatDirExport};
use crate::import::banshee;
use crate::playlist::{AutoPlaylist, Playlist, SimplePlaylist};
use crate::tags::LoftyTagReader;
use crate::Error;
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDateTime};
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Asks on the terminal. Unanswerable questions (closed stdin) count as
/// "no".
#[derive(Debug, Clone, Copy)]
pub struct StdinPrompt {
    /// Ask about unexpected extensions instead of skipping those files.
    pub ask_extensions: bool,
}

impl AddPrompt for StdinPrompt {
    fn accept_extension(&mut self, path: &Path, ext: &str) -> bool {
        if !self.ask_extensions {
            return false;
        }
        let question = format!("`{}` has unexpected extension `{ext}`. Add anyway?", path.display());
        confirm(&question, false).unwrap_or_else(|e| {
            warn!("Could not read answer: {e}");
            false
        })
    }

    fn accept_directory(&mut self, path: &Path) -> bool {
        let question = format!("`{}` is a directory. Add its contents?", path.display());
        confirm(&question, false).unwrap_or_else(|e| {
            warn!("Could not read answer: {e}");
            false
        })
    }
}

/// Yes/no question on stderr; an empty answer picks `default`.
fn confirm(question: &str, default: bool) -> io::Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    eprint!("{question} {hint} ");
    io::stderr().flush()?;

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer)? == 0 {
        return Ok(false);
    }

    Ok(match answer.trim().to_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

fn load(rc: &RuntimeConfig) -> Result<Catalog> {
    let root = rc.library_root()?;
    Catalog::load(&root).with_context(|| format!("Failed to load library at {}", root.display()))
}

fn save(catalog: &Catalog) -> Result<()> {
    catalog
        .save()
        .with_context(|| format!("Failed to save {}", catalog.config_path().display()))
}

/// Creates a library in `--library` or the working directory.
pub fn init(rc: &RuntimeConfig) -> Result<()> {
    let root = match &rc.library {
        Some(path) => config::absolute(path)?,
        None => env::current_dir().context("Failed to read the working directory")?,
    };

    if config::is_library(&root) {
        bail!("{} is already a library", root.display());
    }
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let catalog = Catalog::init(&root)?;
    save(&catalog)?;
    println!("Initialized empty library in {}", root.display());
    Ok(())
}

pub fn status(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;

    println!("Library: {}", catalog.path().display());
    println!("Songs: {}", catalog.song_count());
    println!("Extensions: {}", catalog.extensions.join(", "));

    println!("Playlists: {}", catalog.playlists.len());
    for (name, playlist) in &catalog.playlists {
        println!(
            "  {name} ({}, {} songs)",
            playlist.kind(),
            playlist.get_songs(&catalog).len()
        );
    }

    println!("Exports: {}", catalog.exports.len());
    for (name, export) in &catalog.exports {
        println!("  {name} ({})", export.kind());
    }
    Ok(())
}

/// Options of `musicman add`, straight from the command line.
#[derive(Debug, Clone)]
pub struct AddArgs {
    pub paths: Vec<PathBuf>,
    pub recurse: bool,
    pub move_files: bool,
    pub date: Option<NaiveDateTime>,
    pub skip_check_extension: bool,
    pub no_bad_extensions: bool,
}

pub fn add(rc: &RuntimeConfig, args: AddArgs) -> Result<()> {
    let mut catalog = load(rc)?;
    let options = AddOptions {
        date_added: args.date.unwrap_or_else(now),
        check_extension: !args.skip_check_extension,
        recurse: args.recurse,
        move_files: args.move_files,
    };
    let mut prompt = StdinPrompt {
        ask_extensions: !args.no_bad_extensions,
    };

    let result = batch::add_paths(&mut catalog, &args.paths, &options, &mut prompt, &LoftyTagReader::new());
    // songs copied before a failure are on disk, keep their records
    save(&catalog)?;
    let summary = result.context("Adding songs failed")?;

    report(&summary);
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn report(summary: &AddSummary) {
    println!("Added {} songs", summary.added.len());
    if !summary.skipped.is_empty() {
        println!("Skipped {} paths", summary.skipped.len());
    }
    if !summary.tag_warnings.is_empty() {
        println!("{} songs have no readable tags", summary.tag_warnings.len());
    }
    for (path, err) in &summary.failed {
        eprintln!("Failed to add `{}`: {err}", path.display());
    }
}

/// Forgets songs. Every name is checked before anything is removed.
pub fn remove(rc: &RuntimeConfig, filenames: &[String]) -> Result<()> {
    let mut catalog = load(rc)?;
    let filenames: BTreeSet<&str> = filenames.iter().map(String::as_str).collect();

    for filename in &filenames {
        if catalog.get_song(filename).is_none() {
            return Err(Error::UnknownSong(filename.to_string()).into());
        }
    }
    for filename in &filenames {
        catalog.remove(filename)?;
    }

    save(&catalog)?;
    println!("Removed {} songs", filenames.len());
    Ok(())
}

pub fn update_metadata(rc: &RuntimeConfig) -> Result<()> {
    let mut catalog = load(rc)?;
    let failures = catalog.update_metadata(&LoftyTagReader::new());
    save(&catalog)?;

    println!("Updated metadata of {} songs", catalog.song_count() - failures.len());
    for failure in &failures {
        eprintln!("{failure}");
    }
    Ok(())
}

/// Runs every configured export.
pub fn export_all(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;
    if catalog.exports.is_empty() {
        println!("No exports configured");
        return Ok(());
    }

    for (name, export) in &catalog.exports {
        info!("Running export `{name}`");
        let report = export
            .update(&catalog)
            .with_context(|| format!("Export `{name}` failed"))?;
        println!("{name}: {} songs, {} playlists", report.songs, report.playlists);
    }
    Ok(())
}

pub fn export_new_flatdir(rc: &RuntimeConfig, name: &str, music_dir: &Path, playlist_dir: &Path) -> Result<()> {
    let mut catalog = load(rc)?;
    if catalog.exports.contains_key(name) {
        bail!("Export `{name}` already exists");
    }

    let export = FlatDirExport::new(config::absolute(music_dir)?, config::absolute(playlist_dir)?);
    export::check_layout(catalog.path(), &export.music_dir, &export.playlist_dir)?;
    catalog.exports.insert(name.to_string(), Export::FlatDir(export));
    save(&catalog)?;
    println!("Added export `{name}`, run `musicman export` to update it");
    Ok(())
}

pub fn export_list(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;
    for (name, export) in &catalog.exports {
        match export {
            Export::FlatDir(flat) => println!(
                "{name}\t{}\t{}\t{}",
                export.kind(),
                flat.music_dir.display(),
                flat.playlist_dir.display()
            ),
        }
    }
    Ok(())
}

pub fn export_delete(rc: &RuntimeConfig, name: &str) -> Result<()> {
    let mut catalog = load(rc)?;
    if catalog.exports.remove(name).is_none() {
        bail!("No export named `{name}`");
    }
    save(&catalog)?;
    println!("Deleted export `{name}`");
    Ok(())
}

pub fn playlist_new(rc: &RuntimeConfig, name: &str, auto: bool) -> Result<()> {
    export::check_playlist_name(name)?;

    let mut catalog = load(rc)?;
    if catalog.playlists.contains_key(name) {
        bail!("Playlist `{name}` already exists");
    }

    let playlist = if auto {
        Playlist::Auto(AutoPlaylist::default())
    } else {
        Playlist::Simple(SimplePlaylist::default())
    };
    let kind = playlist.kind();
    catalog.playlists.insert(name.to_string(), playlist);
    save(&catalog)?;

    println!("Created {kind} playlist `{name}`");
    if auto {
        println!("Edit its conditions with `musicman vi`");
    }
    Ok(())
}

pub fn playlist_list(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;
    for (name, playlist) in &catalog.playlists {
        println!("{name}\t{}", playlist.kind());
    }
    Ok(())
}

/// Prints a playlist as M3U.
pub fn playlist_show(rc: &RuntimeConfig, name: &str) -> Result<()> {
    let catalog = load(rc)?;
    let playlist = catalog
        .playlists
        .get(name)
        .with_context(|| format!("No playlist named `{name}`"))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in playlist.get_m3u(&catalog) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

pub fn playlist_append(rc: &RuntimeConfig, name: &str, filenames: &[String]) -> Result<()> {
    let mut catalog = load(rc)?;

    for filename in filenames {
        if catalog.get_song(filename).is_none() {
            return Err(Error::UnknownSong(filename.clone()).into());
        }
    }

    match catalog.playlists.get_mut(name) {
        Some(Playlist::Simple(simple)) => simple.songs.extend(filenames.iter().cloned()),
        Some(other) => bail!("Playlist `{name}` is an {} playlist, edit its rules instead", other.kind()),
        None => bail!("No playlist named `{name}`"),
    }

    save(&catalog)?;
    println!("Appended {} songs to `{name}`", filenames.len());
    Ok(())
}

pub fn playlist_delete(rc: &RuntimeConfig, name: &str) -> Result<()> {
    let mut catalog = load(rc)?;
    if catalog.playlists.remove(name).is_none() {
        bail!("No playlist named `{name}`");
    }
    save(&catalog)?;
    println!("Deleted playlist `{name}`");
    Ok(())
}

/// Adds every local track of a Banshee library, keeping Banshee's dates.
pub fn import_banshee(rc: &RuntimeConfig, dir: Option<&Path>, no_bad_extensions: bool) -> Result<()> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => config::default_banshee_dir().context("Could not determine the Banshee directory")?,
    };

    let mut catalog = load(rc)?;
    let candidates = banshee::read_candidates(&banshee::db_path(&dir))?;
    info!("Importing {} tracks from {}", candidates.len(), dir.display());

    let mut prompt = StdinPrompt {
        ask_extensions: !no_bad_extensions,
    };
    let tags = LoftyTagReader::new();
    let mut summary = AddSummary::default();
    let mut result = Ok(());

    for candidate in candidates {
        let options = AddOptions {
            date_added: candidate.date_added,
            check_extension: true,
            recurse: false,
            move_files: false,
        };
        result = batch::add_into(&mut catalog, &[candidate.path], &options, &mut prompt, &tags, &mut summary);
        if result.is_err() {
            break;
        }
    }

    save(&catalog)?;
    result.context("Import failed")?;
    report(&summary);
    Ok(())
}

/// Opens the catalog file in an editor. The edit happens on a scratch copy
/// and only replaces the real catalog once it loads cleanly.
pub fn vi(rc: &RuntimeConfig) -> Result<()> {
    let root = rc.library_root()?;
    let config_path = root.join(FILENAME_CONFIG);

    let scratch = tempfile::TempDir::new().context("Failed to create a scratch directory")?;
    let scratch_path = scratch.path().join(FILENAME_CONFIG);
    fs::copy(&config_path, &scratch_path)
        .with_context(|| format!("Failed to copy {}", config_path.display()))?;

    let editor = config::default_editor();
    loop {
        run_editor(&editor, &scratch_path)?;

        let text = fs::read_to_string(&scratch_path)
            .with_context(|| format!("Failed to read {}", scratch_path.display()))?;
        match Catalog::from_json(&root, &text) {
            Ok(catalog) => {
                save(&catalog)?;
                println!("Catalog updated");
                return Ok(());
            }
            Err(e) => {
                eprintln!("Invalid catalog: {e}");
                if !confirm("Edit again?", true)? {
                    println!("Discarding changes");
                    return Ok(());
                }
            }
        }
    }
}

fn run_editor(editor: &str, path: &Path) -> Result<()> {
    let mut words = editor.split_whitespace();
    let program = words.next().unwrap_or("vi");

    debug!("Running `{editor}` on {}", path.display());
    let status = process::Command::new(program)
        .args(words)
        .arg(path)
        .status()
        .with_context(|| format!("Failed to run editor `{editor}`"))?;

    if !status.success() {
        bail!("Editor exited with {status}, catalog left unchanged");
    }
    Ok(())
}

pub fn debug_dump(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;
    print!("{}", catalog.to_json()?);
    Ok(())
}

/// Round-trips the catalog through load and save.
pub fn debug_save(rc: &RuntimeConfig) -> Result<()> {
    let catalog = load(rc)?;
    save(&catalog)?;
    println!("Saved {}", catalog.config_path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn library() -> (TempDir, RuntimeConfig) {
        let dir = TempDir::new().unwrap();
        let rc = RuntimeConfig::with_library(Some(dir.path().to_path_buf()));
        init(&rc).unwrap();
        (dir, rc)
    }

    #[test]
    fn test_init_refuses_existing_library() {
        let (_dir, rc) = library();
        assert!(init(&rc).is_err());
    }

    #[test]
    fn test_playlist_lifecycle() {
        let (dir, rc) = library();

        playlist_new(&rc, "favs", false).unwrap();
        playlist_new(&rc, "recent", true).unwrap();
        assert!(playlist_new(&rc, "favs", false).is_err());
        assert!(playlist_new(&rc, "a/b", false).is_err());

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(catalog.playlists["favs"].kind(), Playlist::SIMPLE);
        assert_eq!(catalog.playlists["recent"].kind(), Playlist::AUTO);

        assert!(playlist_append(&rc, "favs", &["ghost.mp3".to_string()]).is_err());
        assert!(playlist_append(&rc, "recent", &[]).is_err());

        playlist_delete(&rc, "recent").unwrap();
        assert!(playlist_delete(&rc, "recent").is_err());
    }

    #[test]
    fn test_remove_checks_all_names_first() {
        let (dir, rc) = library();
        let mut catalog = Catalog::load(dir.path()).unwrap();
        catalog.insert_song(crate::song::Song::new("a.mp3", now()));
        catalog.save().unwrap();

        let err = remove(&rc, &["a.mp3".to_string(), "b.mp3".to_string()]).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnknownSong(name)) if name == "b.mp3"));
        assert!(Catalog::load(dir.path()).unwrap().get_song("a.mp3").is_some());

        remove(&rc, &["a.mp3".to_string()]).unwrap();
        assert_eq!(Catalog::load(dir.path()).unwrap().song_count(), 0);
    }

    #[test]
    fn test_remove_repeated_name_removes_once() {
        let (dir, rc) = library();
        let mut catalog = Catalog::load(dir.path()).unwrap();
        for name in ["a.mp3", "b.mp3"] {
            fs::write(catalog.song_path(name), name).unwrap();
            catalog.insert_song(crate::song::Song::new(name, now()));
        }
        catalog.save().unwrap();

        remove(&rc, &["a.mp3".to_string(), "a.mp3".to_string()]).unwrap();

        let catalog = Catalog::load(dir.path()).unwrap();
        assert!(catalog.get_song("a.mp3").is_none());
        assert!(catalog.get_song("b.mp3").is_some());
        assert!(catalog.song_path("a.mp3").is_file());
    }

    #[test]
    fn test_export_configuration() {
        let (dir, rc) = library();
        let device = TempDir::new().unwrap();
        let out = device.path().join("out");

        export_new_flatdir(&rc, "car", &out.join("music"), &out.join("lists")).unwrap();
        assert!(export_new_flatdir(&rc, "car", &out, &out).is_err());

        let unsafe_layouts = [
            (out.clone(), out.clone()),
            (out.clone(), out.join("lists")),
            (out.join("music"), dir.path().to_path_buf()),
            (dir.path().join("links"), out.join("lists")),
        ];
        for (music_dir, playlist_dir) in &unsafe_layouts {
            let err = export_new_flatdir(&rc, "bad", music_dir, playlist_dir).unwrap_err();
            assert!(matches!(err.downcast_ref::<Error>(), Some(Error::UnsafeExportDir { .. })));
        }
        assert!(!Catalog::load(dir.path()).unwrap().exports.contains_key("bad"));

        let catalog = Catalog::load(dir.path()).unwrap();
        assert_eq!(
            catalog.exports["car"],
            Export::FlatDir(FlatDirExport::new(out.join("music"), out.join("lists")))
        );

        export_delete(&rc, "car").unwrap();
        assert!(export_delete(&rc, "car").is_err());
    }
}
