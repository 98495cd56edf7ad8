//! Package discovery.
//!
//! A package is an immediate subdirectory of the packages root that holds a
//! `pkg` output directory. Discovery loads each package's metadata up front,
//! so a missing or malformed descriptor fails the run before anything is
//! built.

use crate::component::ProcessSource;
use crate::error::{PackagerError, Result};
use crate::metadata::{PackageId, PackageMetadata, locate_metadata};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Name of the per-package output directory that gets archived.
pub const OUTPUT_DIR: &str = "pkg";

/// Build manifest file name marking a crate.
const CARGO_MANIFEST: &str = "Cargo.toml";

/// A discovered package with its metadata loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageDir {
    /// Package source directory.
    pub root: Utf8PathBuf,
    /// Output directory receiving components (`<root>/pkg`).
    pub output_dir: Utf8PathBuf,
    /// Path of the metadata descriptor that was loaded.
    pub metadata_path: Utf8PathBuf,
    /// Parsed metadata.
    pub metadata: PackageMetadata,
}

impl PackageDir {
    /// Load the package rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingMetadata`] if the package has no
    /// usable metadata descriptor.
    pub fn load(root: &Utf8Path) -> Result<Self> {
        let metadata_path = locate_metadata(root);
        let metadata = PackageMetadata::load(&metadata_path)?;
        Ok(Self {
            root: root.to_owned(),
            output_dir: root.join(OUTPUT_DIR),
            metadata_path,
            metadata,
        })
    }

    /// The package identity.
    #[must_use]
    pub fn id(&self) -> PackageId {
        self.metadata.id()
    }

    /// Directory name of the package.
    #[must_use]
    pub fn dir_name(&self) -> &str {
        self.root.file_name().unwrap_or(self.root.as_str())
    }

    /// File name of the package archive in the bootstrap bundle.
    #[must_use]
    pub fn archive_filename(&self) -> String {
        format!("{}.zip", self.dir_name())
    }

    /// Process crates making up the package, sorted by directory name.
    ///
    /// A package whose own `Cargo.toml` is a plain crate is a single
    /// process. Otherwise, including when that manifest declares a
    /// `[workspace]`, every immediate subdirectory holding a `Cargo.toml`
    /// is a process.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Io`] if the package directory cannot be read.
    pub fn processes(&self) -> Result<Vec<ProcessSource>> {
        let manifest = self.root.join(CARGO_MANIFEST);
        if manifest.is_file() && !is_workspace_root(&manifest) {
            return Ok(vec![ProcessSource::from_dir(self.id(), &self.root)?]);
        }

        let mut processes = Vec::new();
        for dir in sorted_subdirs(&self.root)? {
            if dir.file_name() == Some(OUTPUT_DIR) {
                continue;
            }
            if dir.join(CARGO_MANIFEST).is_file() {
                processes.push(ProcessSource::from_dir(self.id(), &dir)?);
            }
        }
        Ok(processes)
    }
}

/// Immediate subdirectories of `packages_root` that hold a `pkg` directory.
///
/// # Errors
///
/// Returns [`PackagerError::DirectoryNotFound`] if the root does not exist,
/// or [`PackagerError::Io`] if it cannot be read.
pub fn scan_packages(packages_root: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    if !packages_root.is_dir() {
        return Err(PackagerError::DirectoryNotFound {
            path: packages_root.to_owned(),
        });
    }
    Ok(sorted_subdirs(packages_root)?
        .into_iter()
        .filter(|dir| dir.join(OUTPUT_DIR).is_dir())
        .collect())
}

/// Discover and load every package under `packages_root`.
///
/// Packages come back sorted by identity `(package, publisher)`, with ties
/// broken by directory name, so table order does not depend on filesystem
/// enumeration order.
///
/// # Errors
///
/// Returns [`PackagerError::MissingMetadata`] for the first package lacking
/// a usable descriptor, or any error from [`scan_packages`].
pub fn discover_packages(packages_root: &Utf8Path) -> Result<Vec<PackageDir>> {
    let mut packages = scan_packages(packages_root)?
        .iter()
        .map(|dir| PackageDir::load(dir))
        .collect::<Result<Vec<_>>>()?;
    packages.sort_by(|a, b| {
        a.id()
            .cmp(&b.id())
            .then_with(|| a.dir_name().cmp(b.dir_name()))
    });
    debug!("discovered {} package(s) under {packages_root}", packages.len());
    Ok(packages)
}

fn sorted_subdirs(dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>> {
    let mut dirs = Vec::new();
    for entry in dir.read_dir_utf8()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_workspace_root(cargo_toml: &Utf8Path) -> bool {
    std::fs::read_to_string(cargo_toml)
        .ok()
        .and_then(|contents| contents.parse::<toml::Table>().ok())
        .is_some_and(|table| table.contains_key("workspace"))
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests fail fast with a message on unexpected errors")]

    use super::*;
    use rstest::rstest;
    use std::fs;

    fn utf8(dir: &tempfile::TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf8 temp dir")
    }

    fn write_package(root: &Utf8Path, dir: &str, package: &str, publisher: &str) -> Utf8PathBuf {
        let pkg = root.join(dir);
        fs::create_dir_all(pkg.join(OUTPUT_DIR)).expect("mkdir");
        fs::write(
            pkg.join("metadata.json"),
            format!(r#"{{"package": "{package}", "publisher": "{publisher}"}}"#),
        )
        .expect("write metadata");
        pkg
    }

    fn write_crate(dir: &Utf8Path, contents: &str) {
        fs::create_dir_all(dir).expect("mkdir");
        fs::write(dir.join(CARGO_MANIFEST), contents).expect("write manifest");
    }

    #[test]
    fn scan_requires_output_dir() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        write_package(&root, "chess", "chess", "uqbar.os");
        fs::create_dir_all(root.join("scratch")).expect("mkdir");
        fs::write(root.join("README.md"), "").expect("write");

        let found = scan_packages(&root).expect("scan");
        assert_eq!(found, vec![root.join("chess")]);
    }

    #[test]
    fn scan_reports_missing_root() {
        let err = scan_packages(Utf8Path::new("/nonexistent/packages")).expect_err("missing");
        assert!(matches!(err, PackagerError::DirectoryNotFound { .. }));
    }

    #[test]
    fn discovery_sorts_by_identity() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        write_package(&root, "a_terminal", "terminal", "uqbar.os");
        write_package(&root, "b_chess", "chess", "uqbar.os");
        write_package(&root, "c_chess", "chess", "alice.os");

        let ids: Vec<String> = discover_packages(&root)
            .expect("discover")
            .iter()
            .map(|p| p.id().to_string())
            .collect();
        assert_eq!(ids, vec!["chess:alice.os", "chess:uqbar.os", "terminal:uqbar.os"]);
    }

    #[test]
    fn discovery_fails_on_missing_metadata() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        write_package(&root, "chess", "chess", "uqbar.os");
        fs::create_dir_all(root.join("broken").join(OUTPUT_DIR)).expect("mkdir");

        let err = discover_packages(&root).expect_err("missing metadata");
        assert!(matches!(
            err,
            PackagerError::MissingMetadata { path, .. } if path == root.join("broken/metadata.json")
        ));
    }

    #[test]
    fn metadata_falls_back_to_output_dir() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        let pkg = root.join("chess");
        fs::create_dir_all(pkg.join(OUTPUT_DIR)).expect("mkdir");
        fs::write(
            pkg.join(OUTPUT_DIR).join("metadata.json"),
            r#"{"package": "chess", "publisher": "uqbar.os"}"#,
        )
        .expect("write");

        let package = PackageDir::load(&pkg).expect("load");
        assert_eq!(package.metadata_path, pkg.join("pkg/metadata.json"));
        assert_eq!(package.archive_filename(), "chess.zip");
    }

    #[rstest]
    #[case::plain_crate("[package]\nname = \"chess\"\n", &["chess"])]
    #[case::workspace("[workspace]\nmembers = [\"ui\", \"worker\"]\n", &["ui", "worker"])]
    fn processes_follow_manifest_shape(#[case] manifest: &str, #[case] expected: &[&str]) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        let pkg = write_package(&root, "chess", "chess", "uqbar.os");
        write_crate(&pkg, manifest);
        write_crate(&pkg.join("worker"), "[package]\nname = \"worker\"\n");
        write_crate(&pkg.join("ui"), "[package]\nname = \"ui\"\n");

        let package = PackageDir::load(&pkg).expect("load");
        let names: Vec<String> = package
            .processes()
            .expect("processes")
            .into_iter()
            .map(|p| p.name.to_string())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn subdirectories_without_manifest_are_not_processes() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = utf8(&temp);
        let pkg = write_package(&root, "key_value", "key_value", "uqbar.os");
        write_crate(&pkg.join("key_value"), "[package]\nname = \"key_value\"\n");
        write_crate(
            &pkg.join("key_value_worker"),
            "[package]\nname = \"key_value_worker\"\n",
        );
        fs::create_dir_all(pkg.join("ui")).expect("mkdir");

        let package = PackageDir::load(&pkg).expect("load");
        let processes = package.processes().expect("processes");
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[1].dir, pkg.join("key_value_worker"));
    }
}
