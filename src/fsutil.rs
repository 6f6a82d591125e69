//! Guarded directory helpers used by exports and library setup.
//!
//! Both helpers refuse to create nested directory trees: the parent of the
//! target must already exist. This catches mistyped paths before anything is
//! written.

use crate::error::{Error, IoContext, Result};
use log::debug;
use path_absolutize::Absolutize;
use std::fs;
use std::path::{Path, PathBuf};

/// What [`ensure_empty_dir`] may delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearPolicy {
    /// Only symlinks. Any other entry aborts before anything is removed.
    SymlinksOnly,
    /// Files, symlinks and whole directory trees.
    Everything,
}

/// Makes sure `path` is a directory, creating it (but not its parents) if
/// it doesn't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => Path::new("/"),
    };

    if !parent.is_dir() {
        return Err(Error::MissingParent(parent.to_path_buf()));
    }

    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => {
            // a symlink to a directory is accepted
            if path.is_dir() {
                Ok(())
            } else {
                Err(Error::NotADirectory(path.to_path_buf()))
            }
        }
        Err(_) => {
            debug!("Creating directory {}", path.display());
            fs::create_dir(path).with_path("create directory", path)
        }
    }
}

/// Makes sure `path` is an empty directory, deleting existing entries
/// according to `policy`.
///
/// Entries are checked before any is deleted, so a policy violation leaves
/// the directory untouched.
pub fn ensure_empty_dir(path: &Path, policy: ClearPolicy) -> Result<()> {
    ensure_dir(path)?;

    let mut entries: Vec<(PathBuf, fs::FileType)> = Vec::new();
    for entry in fs::read_dir(path).with_path("read directory", path)? {
        let entry = entry.with_path("read directory", path)?;
        let file_type = entry.file_type().with_path("inspect", &entry.path())?;
        entries.push((entry.path(), file_type));
    }

    if policy == ClearPolicy::SymlinksOnly {
        if let Some((entry, file_type)) = entries.iter().find(|(_, t)| !t.is_symlink()) {
            return Err(Error::RefusingToDelete {
                what: if file_type.is_dir() {
                    "directory"
                } else {
                    "non-link file"
                },
                entry: entry.clone(),
                dir: path.to_path_buf(),
            });
        }
    }

    for (entry, file_type) in &entries {
        if file_type.is_dir() {
            fs::remove_dir_all(entry).with_path("remove directory", entry)?;
        } else {
            fs::remove_file(entry).with_path("remove file", entry)?;
        }
    }

    debug!("Cleared {} entries from {}", entries.len(), path.display());
    Ok(())
}

/// Canonical form of a directory that may not exist yet. Its parent must
/// exist; symlinks along the way are resolved.
pub fn resolve_dir(path: &Path) -> Result<PathBuf> {
    let path = path.absolutize().with_path("resolve path", path)?;
    if let Ok(real) = fs::canonicalize(&path) {
        return Ok(real);
    }

    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(Error::NotADirectory(path.to_path_buf()));
    };
    let parent = fs::canonicalize(parent).map_err(|_| Error::MissingParent(parent.to_path_buf()))?;
    Ok(parent.join(name))
}

/// Creates a symlink at `link` pointing to `target`.
pub fn symlink_file(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    let result = std::os::unix::fs::symlink(target, link);
    #[cfg(windows)]
    let result = std::os::windows::fs::symlink_file(target, link);

    result.with_path("create symlink", link)
}
