//! Directory-to-zip construction with normalized metadata.
//!
//! Entries are visited depth-first with siblings sorted by file name, and a
//! directory is always emitted before anything it contains. Every entry is
//! stamped with [`CANONICAL_TIMESTAMP`]. Files keep their permission bits and
//! are deflated; directories are stored with mode 0755 and no payload.

use super::error::ArchiveError;
use log::trace;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Date and time stamped on every archive entry: 2023-06-19 00:00:00.
pub const CANONICAL_TIMESTAMP: (u16, u8, u8, u8, u8, u8) = (2023, 6, 19, 0, 0, 0);

/// Mode recorded for directory entries.
pub const DIRECTORY_MODE: u32 = 0o755;

#[cfg(not(unix))]
const DEFAULT_FILE_MODE: u32 = 0o644;

/// What an archive entry holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A directory; stored without payload.
    Directory,
    /// A regular file, read from `source` when the archive is written.
    File {
        /// Absolute path of the file on disk.
        source: PathBuf,
    },
}

/// One planned archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// `/`-separated path relative to the archive root.
    pub name: String,
    /// Directory or file.
    pub kind: EntryKind,
    /// Permission bits recorded in the archive.
    pub mode: u32,
}

impl ArchiveEntry {
    /// Whether this entry is a directory.
    #[must_use]
    pub const fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Directory)
    }
}

/// Plan the entries for archiving `root`, in emission order.
///
/// Symlinks are followed, so a linked file is archived as a regular file
/// with the target's content and permissions.
///
/// # Errors
///
/// Returns [`ArchiveError::NotADirectory`] if `root` is not a directory,
/// [`ArchiveError::NonUtf8Path`] for entry names that are not UTF-8, and
/// [`ArchiveError::Walk`] / [`ArchiveError::Io`] on filesystem failures.
pub fn collect_entries(root: &Path) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    if !root.is_dir() {
        return Err(ArchiveError::NotADirectory(root.to_path_buf()));
    }

    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for item in walker {
        let item = item?;
        let relative = item
            .path()
            .strip_prefix(root)
            .map_err(|_| ArchiveError::NonUtf8Path(item.path().to_path_buf()))?;
        let name = entry_name(relative)?;

        if item.file_type().is_dir() {
            entries.push(ArchiveEntry {
                name,
                kind: EntryKind::Directory,
                mode: DIRECTORY_MODE,
            });
        } else if item.file_type().is_file() {
            let mode = file_mode(&item.metadata()?);
            entries.push(ArchiveEntry {
                name,
                kind: EntryKind::File {
                    source: item.path().to_path_buf(),
                },
                mode,
            });
        } else {
            trace!("skipping special file {}", item.path().display());
        }
    }

    Ok(entries)
}

/// Build archive bytes covering every directory and file under `root`.
///
/// # Errors
///
/// Propagates any error from [`collect_entries`], from reading file
/// contents, or from the zip encoder.
pub fn archive_directory(root: &Path) -> Result<Vec<u8>, ArchiveError> {
    let entries = collect_entries(root)?;
    let timestamp = canonical_timestamp()?;
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in &entries {
        match &entry.kind {
            EntryKind::Directory => {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Stored)
                    .unix_permissions(entry.mode)
                    .last_modified_time(timestamp);
                zip.add_directory(format!("{}/", entry.name), options)?;
            }
            EntryKind::File { source } => {
                let options = SimpleFileOptions::default()
                    .compression_method(CompressionMethod::Deflated)
                    .unix_permissions(entry.mode)
                    .last_modified_time(timestamp);
                zip.start_file(entry.name.as_str(), options)?;
                let mut file = fs::File::open(source)?;
                io::copy(&mut file, &mut zip)?;
            }
        }
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Archive `root` and write the result to `dest`, creating parent
/// directories as needed. Returns the archive bytes.
///
/// # Errors
///
/// Returns any error from [`archive_directory`] or from writing `dest`.
pub fn write_archive(root: &Path, dest: &Path) -> Result<Vec<u8>, ArchiveError> {
    let bytes = archive_directory(root)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(dest, &bytes)?;
    Ok(bytes)
}

/// The canonical entry timestamp as a zip `DateTime`.
///
/// # Errors
///
/// Returns [`ArchiveError::InvalidTimestamp`] if the zip encoder cannot
/// represent [`CANONICAL_TIMESTAMP`].
pub fn canonical_timestamp() -> Result<DateTime, ArchiveError> {
    let (year, month, day, hour, minute, second) = CANONICAL_TIMESTAMP;
    DateTime::from_date_and_time(year, month, day, hour, minute, second)
        .map_err(|_| ArchiveError::InvalidTimestamp)
}

/// Join path components with `/` regardless of host separator.
fn entry_name(relative: &Path) -> Result<String, ArchiveError> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            let part = part
                .to_str()
                .ok_or_else(|| ArchiveError::NonUtf8Path(relative.to_path_buf()))?;
            parts.push(part);
        }
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;

    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        DEFAULT_FILE_MODE & !0o222
    } else {
        DEFAULT_FILE_MODE
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
