//! Modification-time staleness checks for process components.
//!
//! A process is up to date when its component exists and none of its inputs
//! (the crate's `Cargo.toml`, `Cargo.lock`, everything under `src/`, plus any
//! shared inputs such as the interface directory and the adapter) has a
//! modification time later than the component's.

use camino::Utf8Path;
use std::io;
use std::time::SystemTime;
use walkdir::WalkDir;

/// Crate-level files, relative to the process directory, that feed a build.
const MANIFEST_INPUTS: &[&str] = &["Cargo.toml", "Cargo.lock"];

/// Source directory, relative to the process directory.
const SOURCE_DIR: &str = "src";

/// Newest modification time among the inputs of a process build.
///
/// Returns `None` when no input exists at all.
///
/// # Errors
///
/// Returns an I/O error if a present input cannot be inspected.
pub fn newest_input_mtime(
    process_dir: &Utf8Path,
    shared_inputs: &[&Utf8Path],
) -> io::Result<Option<SystemTime>> {
    let mut newest: Option<SystemTime> = None;
    let mut consider = |time: SystemTime| {
        newest = Some(newest.map_or(time, |current| current.max(time)));
    };

    for name in MANIFEST_INPUTS {
        let path = process_dir.join(name);
        if path.is_file() {
            consider(std::fs::metadata(&path)?.modified()?);
        }
    }

    let roots = std::iter::once(process_dir.join(SOURCE_DIR))
        .chain(shared_inputs.iter().map(|p| p.to_path_buf()));
    for root in roots {
        if !root.exists() {
            continue;
        }
        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(io::Error::other)?;
            if entry.file_type().is_file() {
                consider(entry.metadata().map_err(io::Error::other)?.modified()?);
            }
        }
    }

    Ok(newest)
}

/// Whether `artifact` exists and is at least as new as every build input.
///
/// # Errors
///
/// Returns an I/O error if an existing input or the artifact cannot be
/// inspected.
pub fn is_up_to_date(
    process_dir: &Utf8Path,
    shared_inputs: &[&Utf8Path],
    artifact: &Utf8Path,
) -> io::Result<bool> {
    let artifact_mtime = match std::fs::metadata(artifact) {
        Ok(meta) => meta.modified()?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    Ok(newest_input_mtime(process_dir, shared_inputs)?
        .is_some_and(|newest| newest <= artifact_mtime))
}
