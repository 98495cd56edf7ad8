//! Semantic wrapper for process names.
//!
//! A process is one crate inside a package that compiles to a single
//! component. Its name is the crate directory name and also names the
//! component file (`<name>.wasm`) written into the package output.

use std::fmt;

/// The name of one process crate inside a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessName(String);

impl ProcessName {
    /// Create a new process name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the process name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File stem cargo uses for the compiled core module.
    ///
    /// Cargo replaces hyphens with underscores in artifact names, so a crate
    /// named `key-value` produces `key_value.wasm`.
    ///
    /// ```
    /// use pkgsmith::process_name::ProcessName;
    ///
    /// assert_eq!(ProcessName::from("key-value").artifact_stem(), "key_value");
    /// ```
    #[must_use]
    pub fn artifact_stem(&self) -> String {
        self.0.replace('-', "_")
    }

    /// File name of the final embedded component.
    #[must_use]
    pub fn component_file_name(&self) -> String {
        format!("{}.wasm", self.0)
    }
}

impl AsRef<str> for ProcessName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProcessName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for ProcessName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ProcessName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
