//! Package metadata descriptors and package identity.
//!
//! Every package carries a `metadata.json` with at least a `package` name
//! and a `publisher`. The pair is the package's identity: it keys install
//! requests, orders the bootstrap table, and names deployment archives.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use std::fmt;

/// File name of the metadata descriptor.
pub const METADATA_FILE: &str = "metadata.json";

/// Identity of a package: its name and the node that publishes it.
///
/// Serializes to `{"package_name": ..., "publisher_node": ...}`, the shape
/// the node's app store expects on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    package_name: String,
    publisher_node: String,
}

impl PackageId {
    /// Create a package identity.
    #[must_use]
    pub fn new(package_name: impl Into<String>, publisher_node: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            publisher_node: publisher_node.into(),
        }
    }

    /// The package name.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// The publishing node.
    #[must_use]
    pub fn publisher_node(&self) -> &str {
        &self.publisher_node
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package_name, self.publisher_node)
    }
}

/// Contents of a `metadata.json` descriptor.
///
/// Only `package` and `publisher` are required; other fields the descriptor
/// may carry are preserved in `extra` but not interpreted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PackageMetadata {
    /// Package name.
    pub package: String,
    /// Publishing node.
    pub publisher: String,
    /// Optional version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Any other descriptor fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PackageMetadata {
    /// Parse a descriptor from JSON text.
    ///
    /// `path` is used only for error reporting.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingMetadata`] if the JSON is malformed,
    /// lacks a required field, or has an empty `package` or `publisher`.
    pub fn parse(contents: &str, path: &Utf8Path) -> Result<Self> {
        let metadata: Self =
            serde_json::from_str(contents).map_err(|e| PackagerError::MissingMetadata {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;

        for (field, value) in [("package", &metadata.package), ("publisher", &metadata.publisher)] {
            if value.trim().is_empty() {
                return Err(PackagerError::MissingMetadata {
                    path: path.to_owned(),
                    reason: format!("field `{field}` is empty"),
                });
            }
        }
        Ok(metadata)
    }

    /// Read and parse the descriptor at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::MissingMetadata`] if the file cannot be read
    /// or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PackagerError::MissingMetadata {
                path: path.to_owned(),
                reason: e.to_string(),
            })?;
        Self::parse(&contents, path)
    }

    /// The package identity described by this metadata.
    #[must_use]
    pub fn id(&self) -> PackageId {
        PackageId::new(self.package.clone(), self.publisher.clone())
    }
}

/// Locate the metadata descriptor for a package directory.
///
/// Looks for `metadata.json` in the package directory first, then inside
/// its `pkg` output directory. When neither exists, the package-level path
/// is returned so the subsequent load reports it as missing.
#[must_use]
pub fn locate_metadata(package_dir: &Utf8Path) -> Utf8PathBuf {
    let primary = package_dir.join(METADATA_FILE);
    if primary.is_file() {
        return primary;
    }
    let in_output = package_dir.join(crate::package::OUTPUT_DIR).join(METADATA_FILE);
    if in_output.is_file() { in_output } else { primary }
}
