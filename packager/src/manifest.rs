//! Bootstrap manifest generation.
//!
//! The host runtime embeds every built package at compile time through a
//! generated Rust source file listing `(archive name, metadata bytes,
//! archive bytes)` triples. A `file_to_metadata.json` index maps each
//! archive name to its parsed metadata. Alongside them, the whole packages
//! directory is bundled into one aggregate archive for distribution, named
//! after the feature set it was built with unless a name is given.
//!
//! Generation is all-or-nothing with respect to the table and the bundle:
//! every referenced path is checked before either file is written.

use crate::archive::{ArchiveDigest, write_archive};
use crate::error::{PackagerError, Result};
use crate::orchestrator::BuiltPackage;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde_json::{Map, Value};
use std::fs;

/// Generated lookup table file name.
pub const TABLE_FILE: &str = "bootstrapped_processes.rs";

/// Aggregate bundle file name for a build without features, written next
/// to the packages directory.
pub const BUNDLE_FILE: &str = "packages.zip";

/// Index from archive file name to package metadata.
pub const INDEX_FILE: &str = "file_to_metadata.json";

/// Subdirectory of the target directory receiving per-package archives.
pub const PACKAGES_SUBDIR: &str = "packages";

/// One row of the bootstrap table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Archive file name, the row's lookup key.
    pub archive_filename: String,
    /// Absolute path of the package metadata descriptor.
    pub metadata_path: Utf8PathBuf,
    /// Absolute path of the package archive.
    pub archive_path: Utf8PathBuf,
}

/// The ordered bootstrap table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapTable {
    entries: Vec<ManifestEntry>,
}

impl BootstrapTable {
    /// Build a table from entries, checking that every referenced path
    /// exists.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ManifestIntegrity`] naming the first missing
    /// path.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Result<Self> {
        for entry in &entries {
            for path in [&entry.metadata_path, &entry.archive_path] {
                if !path.is_file() {
                    return Err(PackagerError::ManifestIntegrity { path: path.clone() });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Table rows in emission order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Render the table as Rust source.
    ///
    /// ```
    /// use pkgsmith::manifest::BootstrapTable;
    ///
    /// let source = BootstrapTable::default().render();
    /// assert!(source.contains("pub static BOOTSTRAPPED_PROCESSES"));
    /// ```
    #[must_use]
    pub fn render(&self) -> String {
        let mut source =
            String::from("pub static BOOTSTRAPPED_PROCESSES: &[(&str, &[u8], &[u8])] = &[\n");
        for entry in &self.entries {
            // Debug formatting yields correctly escaped string literals.
            source.push_str(&format!(
                "    ({:?}, include_bytes!({:?}), include_bytes!({:?})),\n",
                entry.archive_filename,
                entry.metadata_path.as_str(),
                entry.archive_path.as_str(),
            ));
        }
        source.push_str("];\n");
        source
    }
}

/// Paths written by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestOutput {
    /// Directory holding the per-package archives and the table.
    pub packages_dir: Utf8PathBuf,
    /// The generated table source file.
    pub table_path: Utf8PathBuf,
    /// The archive name to metadata index.
    pub index_path: Utf8PathBuf,
    /// The aggregate bundle.
    pub bundle_path: Utf8PathBuf,
    /// Digest of the aggregate bundle.
    pub bundle_digest: ArchiveDigest,
    /// Table rows, in emission order.
    pub entries: Vec<ManifestEntry>,
}

/// Writes package archives, the bootstrap table and the aggregate bundle.
#[derive(Debug, Clone)]
pub struct ManifestGenerator {
    target_dir: Utf8PathBuf,
    bundle_name: String,
}

impl ManifestGenerator {
    /// Generate under `target_dir`, naming the bundle [`BUNDLE_FILE`].
    #[must_use]
    pub fn new(target_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            target_dir: target_dir.into(),
            bundle_name: BUNDLE_FILE.to_owned(),
        }
    }

    /// Use `name`, relative to the target directory, for the bundle.
    #[must_use]
    pub fn bundle_name(mut self, name: impl Into<String>) -> Self {
        self.bundle_name = name.into();
        self
    }

    /// Directory receiving per-package archives and the table.
    #[must_use]
    pub fn packages_dir(&self) -> Utf8PathBuf {
        self.target_dir.join(PACKAGES_SUBDIR)
    }

    /// Write everything for `packages`, in the given order.
    ///
    /// The packages directory is recreated from scratch so archives from
    /// earlier runs never leak into the bundle.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ManifestIntegrity`] if a referenced file is
    /// missing and [`PackagerError::MissingMetadata`] if a descriptor is not
    /// valid JSON. In both cases neither the table nor the bundle is
    /// written. I/O and archive errors propagate unchanged.
    pub fn generate(&self, packages: &[BuiltPackage]) -> Result<ManifestOutput> {
        let packages_dir = self.packages_dir();
        if packages_dir.exists() {
            fs::remove_dir_all(&packages_dir)?;
        }
        fs::create_dir_all(&packages_dir)?;

        let mut entries = Vec::with_capacity(packages.len());
        for package in packages {
            let archive_path = packages_dir.join(&package.archive_filename);
            fs::write(&archive_path, &package.archive_bytes)?;
            debug!("wrote {archive_path}");
            entries.push(ManifestEntry {
                archive_filename: package.archive_filename.clone(),
                metadata_path: absolute(&package.metadata_path)?,
                archive_path: absolute(&archive_path)?,
            });
        }

        let table = BootstrapTable::from_entries(entries)?;
        let index = metadata_index(table.entries())?;
        let index_path = packages_dir.join(INDEX_FILE);
        fs::write(&index_path, index)?;
        let table_path = packages_dir.join(TABLE_FILE);
        fs::write(&table_path, table.render())?;

        let bundle_path = self.target_dir.join(&self.bundle_name);
        let bundle = write_archive(packages_dir.as_std_path(), bundle_path.as_std_path())?;
        let bundle_digest = ArchiveDigest::of(&bundle);
        info!("wrote {bundle_path} (sha256 {bundle_digest})");

        Ok(ManifestOutput {
            packages_dir,
            table_path,
            index_path,
            bundle_path,
            bundle_digest,
            entries: table.entries,
        })
    }
}

/// Bundle file name for a build with `features`, or `explicit` if given.
///
/// Features are sorted so the same set always yields the same name.
///
/// ```
/// use pkgsmith::manifest::bundle_file_name;
///
/// assert_eq!(bundle_file_name(&[], None), "packages.zip");
/// let features = vec!["simulation-mode".to_owned(), "llm".to_owned()];
/// assert_eq!(bundle_file_name(&features, None), "packages-llm,simulation-mode.zip");
/// assert_eq!(bundle_file_name(&features, Some("dev.zip")), "dev.zip");
/// ```
#[must_use]
pub fn bundle_file_name(features: &[String], explicit: Option<&str>) -> String {
    if let Some(name) = explicit {
        return name.to_owned();
    }
    if features.is_empty() {
        return BUNDLE_FILE.to_owned();
    }
    let mut features = features.to_vec();
    features.sort();
    features.dedup();
    format!("packages-{}.zip", features.join(","))
}

/// Pretty-printed JSON object from archive file name to parsed metadata.
fn metadata_index(entries: &[ManifestEntry]) -> Result<String> {
    let mut index = Map::new();
    for entry in entries {
        let raw = fs::read_to_string(&entry.metadata_path)?;
        let metadata: Value =
            serde_json::from_str(&raw).map_err(|e| PackagerError::MissingMetadata {
                path: entry.metadata_path.clone(),
                reason: e.to_string(),
            })?;
        index.insert(entry.archive_filename.clone(), metadata);
    }
    Ok(serde_json::to_string_pretty(&Value::Object(index))?)
}

fn absolute(path: &Utf8Path) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let cwd = std::env::current_dir()?;
    let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| PackagerError::NonUtf8Path {
        path: p.display().to_string(),
    })?;
    Ok(cwd.join(path))
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
