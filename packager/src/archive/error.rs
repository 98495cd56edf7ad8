//! Error types for archive construction and extraction.

use std::path::PathBuf;
use thiserror::Error;

/// Errors arising from building or unpacking package archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// An I/O operation failed (reading sources, writing output).
    #[error("archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The zip encoder or decoder rejected the data.
    #[error("zip format error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Walking the source tree failed.
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// The archive root is missing or is not a directory.
    #[error("archive root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An entry path cannot be encoded as UTF-8.
    #[error("archive entry path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    /// The canonical timestamp could not be represented.
    #[error("canonical archive timestamp is out of range")]
    InvalidTimestamp,

    /// An archive entry attempts to escape the extraction directory.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending entry name.
        path: String,
    },
}
