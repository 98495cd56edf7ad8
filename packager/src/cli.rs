//! CLI argument definitions for pkgsmith.
//!
//! Kept apart from the binary so the parsing rules can be tested directly.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Build WebAssembly process packages and install them on a node.
#[derive(Parser, Debug)]
#[command(name = "pkgsmith")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Build every package and the bootstrap bundle:\n",
    "    $ pkgsmith build\n\n",
    "  Build with extra features, skipping UI assets:\n",
    "    $ pkgsmith build --features simulation-mode --skip-build-frontend\n\n",
    "  Build into a custom bundle name:\n",
    "    $ pkgsmith build --output-filename dev-packages.zip\n\n",
    "  Install a package directory on a local node:\n",
    "    $ pkgsmith install http://localhost:8080 modules/chess/pkg fake.os\n\n",
    "  Archive an arbitrary directory:\n",
    "    $ pkgsmith archive modules/chess/pkg -o chess.zip",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: pkgsmith.toml in the current directory].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build every package, its archive, the bootstrap table and the bundle.
    Build(BuildArgs),

    /// Archive a package directory and install it on a running node.
    Install(InstallArgs),

    /// Write a deterministic archive of a directory and print its digest.
    Archive(ArchiveArgs),
}

/// Arguments for `pkgsmith build`.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildArgs {
    /// Cargo features for every process (repeatable or comma-separated).
    #[arg(long, value_name = "FEATURES")]
    pub features: Vec<String>,

    /// Do not run frontend `build.sh` scripts.
    #[arg(long)]
    pub skip_build_frontend: bool,

    /// Rebuild every process even when its component is up to date.
    #[arg(long)]
    pub force: bool,

    /// Bundle file name under the target directory
    /// [default: packages.zip, or packages-{features}.zip with features].
    #[arg(long, value_name = "FILE")]
    pub output_filename: Option<String>,
}

/// Arguments for `pkgsmith install`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct InstallArgs {
    /// Base URL of the node, e.g. `http://localhost:8080`.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Package directory holding `metadata.json`.
    #[arg(value_name = "PKG_DIR")]
    pub pkg_dir: Utf8PathBuf,

    /// Node name to address in the request envelope.
    #[arg(value_name = "NODE")]
    pub node: Option<String>,

    /// Use the control path of older nodes (`/rpc/message`).
    #[arg(long)]
    pub legacy_path: bool,

    /// Ask the node to mirror the package for others.
    #[arg(long)]
    pub mirror: bool,
}

/// Arguments for `pkgsmith archive`.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArgs {
    /// Directory to archive.
    #[arg(value_name = "DIR")]
    pub dir: Utf8PathBuf,

    /// Where to write the archive.
    #[arg(short, long, value_name = "FILE")]
    pub output: Utf8PathBuf,
}

/// Log level selected by the `-v` count.
///
/// ```
/// use pkgsmith::cli::log_level_for;
///
/// assert_eq!(log_level_for(0), "warn");
/// assert_eq!(log_level_for(5), "trace");
/// ```
#[must_use]
pub fn log_level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
