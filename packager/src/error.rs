//! Error types for the pkgsmith build and install pipeline.
//!
//! Every failure in the pipeline is fatal for the run it occurs in. The
//! variants below carry enough context (package, process, step, phase) for
//! the top-level binary to print an actionable message before exiting.

use crate::archive::ArchiveError;
use crate::component::CompileStep;
use crate::install::InstallPhase;
use crate::metadata::PackageId;
use crate::process_name::ProcessName;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors that can occur while building, packaging, or installing packages.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// An external toolchain invocation exited non-zero or could not start.
    #[error("{step} step failed for process {process} of {package}: {reason}")]
    ToolInvocation {
        /// Package the failing process belongs to.
        package: PackageId,
        /// The process whose compilation failed.
        process: ProcessName,
        /// The compile step that failed.
        step: CompileStep,
        /// Captured stderr or spawn failure description.
        reason: String,
    },

    /// The package metadata descriptor was missing or could not be parsed.
    #[error("package metadata at {path} is missing or invalid: {reason}")]
    MissingMetadata {
        /// Where the descriptor was expected.
        path: Utf8PathBuf,
        /// Description of what was wrong with it.
        reason: String,
    },

    /// A bootstrap table entry references a file that does not exist.
    #[error("manifest entry references missing path {path}")]
    ManifestIntegrity {
        /// The missing path.
        path: Utf8PathBuf,
    },

    /// The control endpoint answered a request with a non-200 status.
    #[error("{phase} failed for {package}: node responded with HTTP {status}")]
    ControlPlane {
        /// `package:publisher` identity of the package being installed.
        package: String,
        /// The protocol phase that failed.
        phase: InstallPhase,
        /// Observed HTTP status code.
        status: u16,
    },

    /// The control endpoint could not be reached at all.
    #[error("{phase} request for {package} to {url} failed: {reason}")]
    Transport {
        /// `package:publisher` identity of the package being installed.
        package: String,
        /// The protocol phase that failed.
        phase: InstallPhase,
        /// The URL that was requested.
        url: String,
        /// Description of the connection failure.
        reason: String,
    },

    /// A frontend build script exists but failed.
    #[error("frontend build failed for {frontend}: {reason}")]
    FrontendBuild {
        /// Frontend directory, relative to the packages root's parent.
        frontend: Utf8PathBuf,
        /// Captured stderr or spawn failure description.
        reason: String,
    },

    /// Creating or reading an archive failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The configuration file could not be parsed.
    #[error("invalid configuration at {path}: {reason}")]
    Config {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Description of the parse error.
        reason: String,
    },

    /// A required directory was not found.
    #[error("directory not found: {path}")]
    DirectoryNotFound {
        /// The missing directory.
        path: Utf8PathBuf,
    },

    /// A path could not be represented as UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the offending path.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A request body could not be serialized.
    #[error("failed to serialize request: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Test stub received an unexpected or mismatched command invocation.
    #[cfg(any(test, feature = "test-support"))]
    #[error("stub mismatch: {message}")]
    StubMismatch {
        /// Description of what was expected versus what was received.
        message: String,
    },
}

/// Result type alias using [`PackagerError`].
pub type Result<T> = std::result::Result<T, PackagerError>;
