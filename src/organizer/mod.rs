//! Moving and copying release files into the library.
//!
//! Provides the two [`FileOperation`]s an import can run with, plus the
//! cleanup steps around them:
//! - trimming files from the destination that this import didn't write
//! - removing the emptied source directory and its parents
//!
//! Both cleanup steps refuse to delete more than a size threshold so a
//! wrong path can't take a real library folder with it.

pub mod treelock;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::pathformat::clean_path;

pub use treelock::{TreeLock, TreeLockGuard};

/// Source directories bigger than this are left alone (20 MB)
pub const CLEAN_THRESHOLD: u64 = 20_000_000;

/// Destination extras bigger than this in total fail the import (3000 MB)
pub const TRIM_THRESHOLD: u64 = 3_000_000_000;

/// "Invalid cross-device link"
const EXDEV: i32 = 18;

/// Per-import record of destination paths written, plus the size brakes
/// for cleanup.
#[derive(Debug, Clone)]
pub struct DirContext {
    known_dest_paths: HashSet<PathBuf>,
    pub clean_threshold: u64,
    pub trim_threshold: u64,
}

impl Default for DirContext {
    fn default() -> Self {
        Self {
            known_dest_paths: HashSet::new(),
            clean_threshold: CLEAN_THRESHOLD,
            trim_threshold: TRIM_THRESHOLD,
        }
    }
}

impl DirContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: &Path) {
        self.known_dest_paths.insert(clean_path(path));
    }

    pub fn is_known(&self, path: &Path) -> bool {
        self.known_dest_paths.contains(&clean_path(path))
    }

    pub fn len(&self) -> usize {
        self.known_dest_paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known_dest_paths.is_empty()
    }
}

/// How release files get from the source directory into the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Move { dry_run: bool },
    Copy { dry_run: bool },
}

impl Default for FileOperation {
    fn default() -> Self {
        Self::Move { dry_run: false }
    }
}

impl FileOperation {
    /// Dry run: log what would happen, change nothing
    pub fn read_only(self) -> bool {
        match self {
            Self::Move { dry_run } | Self::Copy { dry_run } => dry_run,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Move { .. } => "move",
            Self::Copy { .. } => "copy",
        }
    }

    /// Put `src` at `dest` and record `dest` as written by this import.
    ///
    /// Moving a file onto itself does nothing, so re-running an import on
    /// its own output is safe. Copying onto itself is a caller mistake.
    pub fn process_file(self, dc: &mut DirContext, src: &Path, dest: &Path) -> Result<()> {
        self.process_file_with(dc, src, dest, |from, to| fs::rename(from, to))
    }

    fn process_file_with(
        self,
        dc: &mut DirContext,
        src: &Path,
        dest: &Path,
        rename: impl Fn(&Path, &Path) -> io::Result<()>,
    ) -> Result<()> {
        dc.add(dest);
        let same = clean_path(src) == clean_path(dest);

        match self {
            Self::Move { dry_run } => {
                if same {
                    return Ok(());
                }
                if dry_run {
                    tracing::info!(from = %src.display(), to = %dest.display(), "[dry run] move");
                    return Ok(());
                }
                match rename(src, dest) {
                    Ok(()) => {}
                    Err(e) if is_cross_device(&e) => {
                        copy_file(src, dest).map_err(|e| e.context("copy from move"))?;
                        fs::remove_file(src)
                            .map_err(|e| Error::file(src, e).context("remove from move"))?;
                    }
                    Err(e) => return Err(Error::file(src, e).context("rename")),
                }
                tracing::debug!(from = %src.display(), to = %dest.display(), "Moved path");
                Ok(())
            }
            Self::Copy { dry_run } => {
                if same {
                    return Err(Error::SelfCopy(dest.to_path_buf()));
                }
                if dry_run {
                    tracing::info!(from = %src.display(), to = %dest.display(), "[dry run] copy");
                    return Ok(());
                }
                copy_file(src, dest)?;
                tracing::debug!(from = %src.display(), to = %dest.display(), "Copied path");
                Ok(())
            }
        }
    }

    /// Remove what's left of the source directory after a move.
    ///
    /// Walks from `src` up to, but not including, `limit`. Each directory is
    /// only removed when it has no subdirectories and holds less than the
    /// clean threshold. The highest directory touched is tree-locked for the
    /// duration. Copying never removes anything.
    pub fn remove_src(self, dc: &DirContext, locks: &TreeLock, limit: &Path, src: &Path) -> Result<()> {
        let Self::Move { dry_run } = self else {
            return Ok(());
        };

        let src = clean_path(src);
        let limit = clean_path(limit);

        let mut to_remove = vec![src.clone()];
        let mut to_lock = src.clone();
        if src != limit && src.starts_with(&limit) {
            let mut dir = src.parent();
            while let Some(d) = dir {
                if d == limit {
                    break;
                }
                to_remove.push(d.to_path_buf());
                to_lock = d.to_path_buf();
                dir = d.parent();
            }
        }

        let _guard = locks.lock([&to_lock]);
        for path in &to_remove {
            safe_remove_all(path, dry_run, dc.clean_threshold)
                .map_err(|e| e.context("safe remove all"))?;
        }
        Ok(())
    }
}

fn is_cross_device(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(EXDEV)
}

/// Stream `src` into a new file at `dest`. A partially written `dest` is
/// removed on failure.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    let mut reader = File::open(src).map_err(|e| Error::file(src, e).context("open src"))?;

    let result = File::create(dest).and_then(|mut writer| {
        io::copy(&mut reader, &mut writer)?;
        writer.sync_all()
    });

    if let Err(e) = result {
        let err = Error::file(dest, e).context("do copy");
        return Err(match fs::remove_file(dest) {
            Err(rm) if rm.kind() != io::ErrorKind::NotFound => {
                Error::Multiple(vec![err, Error::file(dest, rm)])
            }
            _ => err,
        });
    }
    Ok(())
}

/// Delete files in `dest` that this import didn't write. Subdirectories are
/// never touched. Fails without deleting anything when the extras add up to
/// more than the trim threshold.
pub fn trim_dest_dir(dc: &DirContext, dest: &Path, dry_run: bool) -> Result<()> {
    let entries = match fs::read_dir(dest) {
        Ok(entries) => entries,
        // nothing was written, e.g. in a dry run
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::file(dest, e).context("read dir")),
    };

    let mut to_delete = Vec::new();
    let mut size = 0u64;
    for entry in entries {
        let entry = entry.map_err(|e| Error::file(dest, e))?;
        let path = dest.join(entry.file_name());
        if dc.is_known(&path) {
            continue;
        }
        let metadata = entry.metadata().map_err(|e| Error::file(&path, e))?;
        if metadata.is_dir() {
            continue;
        }
        size += metadata.len();
        to_delete.push(path);
    }

    if size > dc.trim_threshold {
        return Err(Error::TrimTooLarge {
            size,
            limit: dc.trim_threshold,
        });
    }

    let mut errors = Vec::new();
    for path in to_delete {
        if dry_run {
            tracing::info!(path = %path.display(), "[dry run] delete extra file");
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "Deleted extra file"),
            Err(e) => errors.push(Error::file(&path, e)),
        }
    }

    match Error::join(errors) {
        Some(err) => Err(err.context("delete extra files")),
        None => Ok(()),
    }
}

/// Remove `dir` and its files, unless it has a child directory (left alone
/// silently) or its contents exceed `threshold` bytes (an error).
pub fn safe_remove_all(dir: &Path, dry_run: bool, threshold: u64) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::file(dir, e).context("read dir")),
    };
    for entry in entries {
        let entry = entry.map_err(|e| Error::file(dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::file(entry.path(), e))?;
        if file_type.is_dir() {
            return Ok(());
        }
    }

    if dry_run {
        tracing::info!(path = %dir.display(), "[dry run] remove all");
        return Ok(());
    }

    let size = dir_size(dir)?;
    if size > threshold {
        return Err(Error::CleanTooLarge {
            path: dir.to_path_buf(),
            size,
            limit: threshold,
        });
    }

    fs::remove_dir_all(dir).map_err(|e| Error::file(dir, e).context("clean up folder"))?;
    tracing::debug!(path = %dir.display(), "Removed path");
    Ok(())
}

/// Total size of the regular files under `path`
pub fn dir_size(path: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(path).to_path_buf();
            Error::file(path, io::Error::other(e.to_string()))
        })?;
        if entry.file_type().is_file() {
            size += entry
                .metadata()
                .map_err(|e| Error::file(entry.path(), io::Error::other(e.to_string())))?
                .len();
        }
    }
    Ok(size)
}
