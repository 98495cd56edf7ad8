//! Deterministic package archives.
//!
//! Package archives are zip files whose bytes depend only on the content and
//! permission bits of the archived tree. Filesystem timestamps and directory
//! enumeration order never leak into the output, so an archive's digest
//! identifies the package build it came from.
//!
//! # Sub-modules
//!
//! - [`builder`] - Directory-to-zip construction with normalized metadata.
//! - [`digest`] - SHA-256 content identifiers for archive bytes.
//! - [`error`] - Error type shared by archive operations.
//! - [`extraction`] - Unpacking with path traversal protection.

pub mod builder;
pub mod digest;
pub mod error;
pub mod extraction;

pub use builder::{ArchiveEntry, EntryKind, archive_directory, collect_entries, write_archive};
pub use digest::ArchiveDigest;
pub use error::ArchiveError;
pub use extraction::extract_archive;
