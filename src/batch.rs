//! Adding many files and directory trees at once.
//!
//! Paths are processed from an explicit worklist, so arbitrarily deep trees
//! never grow the call stack. Per-path problems (hidden or blacklisted
//! names, rejected extensions, name collisions) are recorded in the
//! [`AddSummary`] and the batch moves on. Copy/move failures abort the
//! batch; songs added before the failure stay in the catalog, unsaved.

use crate::catalog::Catalog;
use crate::config::FILE_BLACKLIST;
use crate::error::{Error, IoContext, Result};
use crate::tags::TagReader;
use chrono::NaiveDateTime;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Decisions the batch defers to the caller.
pub trait AddPrompt {
    /// A file's extension isn't in the library's allow-list. Add it anyway?
    fn accept_extension(&mut self, path: &Path, ext: &str) -> bool;

    /// A directory was found and recursion wasn't requested. Descend?
    fn accept_directory(&mut self, path: &Path) -> bool;
}

/// Prompt with fixed answers, for non-interactive use.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedAnswers {
    pub extensions: bool,
    pub directories: bool,
}

impl AddPrompt for FixedAnswers {
    fn accept_extension(&mut self, _path: &Path, _ext: &str) -> bool {
        self.extensions
    }

    fn accept_directory(&mut self, _path: &Path) -> bool {
        self.directories
    }
}

#[derive(Debug, Clone)]
pub struct AddOptions {
    pub date_added: NaiveDateTime,
    /// Check extensions against the library's allow-list.
    pub check_extension: bool,
    /// Descend into directories without asking.
    pub recurse: bool,
    /// Move files into the library instead of copying.
    pub move_files: bool,
}

/// Why a path was not added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Blacklisted,
    Hidden,
    Missing,
    Extension(String),
    Directory,
}

/// Result of a batch add.
#[derive(Debug, Default)]
pub struct AddSummary {
    /// Generated filenames, in the order they were added.
    pub added: Vec<String>,
    pub skipped: Vec<(PathBuf, SkipReason)>,
    /// Paths that could not be added, with the error.
    pub failed: Vec<(PathBuf, Error)>,
    /// Songs added without metadata because tags were unreadable.
    pub tag_warnings: Vec<PathBuf>,
}

impl AddSummary {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failed.is_empty()
    }
}

/// Adds every path in `paths`, descending into directories.
pub fn add_paths(
    catalog: &mut Catalog,
    paths: &[PathBuf],
    options: &AddOptions,
    prompt: &mut dyn AddPrompt,
    tags: &dyn TagReader,
) -> Result<AddSummary> {
    let mut summary = AddSummary::default();
    add_into(catalog, paths, options, prompt, tags, &mut summary)?;
    Ok(summary)
}

/// Like [`add_paths`], accumulating into an existing summary so callers can
/// run several batches (e.g. one per import date) and report once.
pub fn add_into(
    catalog: &mut Catalog,
    paths: &[PathBuf],
    options: &AddOptions,
    prompt: &mut dyn AddPrompt,
    tags: &dyn TagReader,
    summary: &mut AddSummary,
) -> Result<()> {
    // reversed so paths pop in the order given
    let mut pending: Vec<PathBuf> = paths.iter().rev().cloned().collect();

    while let Some(path) = pending.pop() {
        let basename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if FILE_BLACKLIST.contains(&basename.to_lowercase().as_str()) {
            info!("Skipping file in blacklist: `{}`", path.display());
            summary.skipped.push((path, SkipReason::Blacklisted));
            continue;
        }

        if basename.starts_with('.') {
            info!("Skipping hidden file/directory: `{}`", path.display());
            summary.skipped.push((path, SkipReason::Hidden));
            continue;
        }

        if path.is_file() {
            let ext = path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();

            if options.check_extension
                && !catalog.allows_extension(&ext)
                && !prompt.accept_extension(&path, &ext)
            {
                info!("Skipping `{}`: unexpected extension `{ext}`", path.display());
                summary.skipped.push((path, SkipReason::Extension(ext)));
                continue;
            }

            match catalog.add(&path, options.date_added, options.move_files, tags) {
                Ok(added) => {
                    if added.tag_warning.is_some() {
                        summary.tag_warnings.push(path.clone());
                    }
                    summary.added.push(added.filename);
                }
                Err(e @ (Error::FilenameCollision(_) | Error::InvalidFilename(_))) => {
                    info!("Not adding `{}`: {e}", path.display());
                    summary.failed.push((path, e));
                }
                Err(e) => return Err(e),
            }
        } else if path.is_dir() {
            if !options.recurse && !prompt.accept_directory(&path) {
                info!("Skipping directory `{}`", path.display());
                summary.skipped.push((path, SkipReason::Directory));
                continue;
            }

            debug!("Descending into {}", path.display());
            pending.extend(sorted_children(&path)?.into_iter().rev());
        } else {
            info!("Song doesn't exist: `{}`", path.display());
            summary.skipped.push((path, SkipReason::Missing));
        }
    }

    Ok(())
}

/// Entries of `dir` in name order. An unreadable entry fails the whole
/// listing rather than dropping that file silently.
fn sorted_children(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).with_path("read directory", dir)? {
        children.push(entry.with_path("read directory", dir)?.path());
    }
    children.sort();
    Ok(children)
}
