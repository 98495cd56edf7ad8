//! Archive extraction with path traversal protection.
//!
//! Unpacks package archives into a directory, recreating directory entries
//! and restoring the recorded permission bits of every entry.

use super::error::ArchiveError;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path};
use zip::ZipArchive;

/// Extract archive `bytes` into `dest_dir`.
///
/// Returns the names of the extracted file entries in archive order.
///
/// # Errors
///
/// Returns [`ArchiveError::PathTraversal`] if any entry would land outside
/// `dest_dir`, [`ArchiveError::Zip`] for malformed archives, and
/// [`ArchiveError::Io`] on write failures.
pub fn extract_archive(bytes: &[u8], dest_dir: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut extracted = Vec::new();
    fs::create_dir_all(dest_dir)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let name = entry.name().to_owned();
        validate_entry_path(Path::new(&name))?;

        let dest_path = dest_dir.join(&name);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&dest_path)?;
            io::copy(&mut entry, &mut out)?;
            extracted.push(name);
        }

        if let Some(mode) = entry.unix_mode() {
            restore_mode(&dest_path, mode)?;
        }
    }

    Ok(extracted)
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ArchiveError> {
    let escapes = path.is_absolute()
        || path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(ArchiveError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o777))
}

#[cfg(not(unix))]
fn restore_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests fail fast with a message on unexpected errors")]

    use super::*;
    use rstest::rstest;
    use std::io::Write;
    use std::path::PathBuf;
    use zip::write::SimpleFileOptions;

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("foo/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let path = PathBuf::from(bad_path);
        assert!(
            matches!(
                validate_entry_path(&path),
                Err(ArchiveError::PathTraversal { .. })
            ),
            "expected PathTraversal for {bad_path}"
        );
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_entry_path(Path::new("ui/assets/app.js")).is_ok());
    }

    #[test]
    fn extraction_refuses_escaping_entries() {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("../evil.txt", SimpleFileOptions::default())
            .expect("start file");
        zip.write_all(b"gotcha").expect("write");
        let bytes = zip.finish().expect("finish").into_inner();

        let temp_dir = tempfile::tempdir().expect("temp dir");
        let dest = temp_dir.path().join("out");
        let result = extract_archive(&bytes, &dest);
        assert!(matches!(result, Err(ArchiveError::PathTraversal { .. })));
        assert!(!temp_dir.path().join("evil.txt").exists());
    }

    #[test]
    fn extraction_rejects_garbage() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let result = extract_archive(b"not a zip", temp_dir.path());
        assert!(matches!(result, Err(ArchiveError::Zip(_))));
    }
}
