//! Human-facing progress and summary lines.
//!
//! Diagnostics go through `log`; the lines here are the ones a user sees on
//! stderr when running the CLI without `--quiet`.

use crate::metadata::PackageId;
use crate::orchestrator::BuiltPackage;
use camino::Utf8Path;
use std::fmt;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; nothing sensible to do on failure.
    }
}

/// Confirmation printed after a package was uploaded and installed.
///
/// ```
/// use pkgsmith::metadata::PackageId;
/// use pkgsmith::output::install_success_message;
///
/// let id = PackageId::new("chess", "uqbar.os");
/// assert_eq!(install_success_message(&id), "Successfully installed chess:uqbar.os");
/// ```
#[must_use]
pub fn install_success_message(id: &PackageId) -> String {
    format!("Successfully installed {id}")
}

/// One summary line per built package: identity, archive name, digest.
#[must_use]
pub fn package_line(package: &BuiltPackage) -> String {
    format!(
        "  {} -> {} (sha256 {})",
        package.id,
        package.archive_filename,
        package.digest.short()
    )
}

/// Closing line of a successful build.
#[must_use]
pub fn build_success_message(count: usize, bundle: &Utf8Path) -> String {
    let plural = if count == 1 { "package" } else { "packages" };
    format!("Built {count} {plural} into {bundle}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::one(1, "Built 1 package into target/packages.zip")]
    #[case::many(3, "Built 3 packages into target/packages.zip")]
    fn build_message_pluralizes(#[case] count: usize, #[case] expected: &str) {
        assert_eq!(
            build_success_message(count, Utf8Path::new("target/packages.zip")),
            expected
        );
    }

    #[test]
    fn stderr_lines_end_with_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "building chess");
        assert_eq!(buffer, b"building chess\n");
    }
}
