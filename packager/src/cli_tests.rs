//! Tests for pkgsmith CLI parsing.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn build_parses_defaults() {
    let cli = Cli::parse_from(["pkgsmith", "build"]);
    assert_eq!(cli.command_build(), BuildArgs::default());
    assert_eq!(cli.verbosity, 0);
    assert!(!cli.quiet);
    assert!(cli.config.is_none());
}

#[test]
fn build_collects_repeated_features() {
    let cli = Cli::parse_from([
        "pkgsmith",
        "build",
        "--features",
        "simulation-mode,llm",
        "--features",
        "debug",
        "--skip-build-frontend",
        "--force",
    ]);
    let args = cli.command_build();
    assert_eq!(args.features, vec!["simulation-mode,llm", "debug"]);
    assert!(args.skip_build_frontend);
    assert!(args.force);
    assert!(args.output_filename.is_none());
}

#[test]
fn build_accepts_output_filename() {
    let cli = Cli::parse_from(["pkgsmith", "build", "--output-filename", "dev.zip"]);
    assert_eq!(cli.command_build().output_filename.as_deref(), Some("dev.zip"));
}

#[test]
fn install_parses_positionals() {
    let cli = Cli::parse_from([
        "pkgsmith",
        "install",
        "http://localhost:8080",
        "modules/chess/pkg",
        "fake.os",
        "--legacy-path",
    ]);
    let Command::Install(args) = cli.command else {
        panic!("expected install command");
    };
    assert_eq!(args.url, "http://localhost:8080");
    assert_eq!(args.pkg_dir, Utf8PathBuf::from("modules/chess/pkg"));
    assert_eq!(args.node.as_deref(), Some("fake.os"));
    assert!(args.legacy_path);
    assert!(!args.mirror);
}

#[test]
fn install_node_is_optional() {
    let cli = Cli::parse_from(["pkgsmith", "install", "http://node", "pkg"]);
    let Command::Install(args) = cli.command else {
        panic!("expected install command");
    };
    assert!(args.node.is_none());
}

#[test]
fn archive_requires_output() {
    assert!(Cli::try_parse_from(["pkgsmith", "archive", "pkg"]).is_err());
    let cli = Cli::parse_from(["pkgsmith", "archive", "pkg", "-o", "out.zip"]);
    assert!(matches!(cli.command, Command::Archive(ref a) if a.output.as_str() == "out.zip"));
}

#[rstest]
#[case::single(&["pkgsmith", "-v", "build"], 1)]
#[case::triple(&["pkgsmith", "build", "-vvv"], 3)]
fn verbosity_counts_flags(#[case] args: &[&str], #[case] expected: u8) {
    let cli = Cli::parse_from(args.iter().copied());
    assert_eq!(cli.verbosity, expected);
}

#[test]
fn quiet_conflicts_with_verbose() {
    assert!(Cli::try_parse_from(["pkgsmith", "build", "-q", "-v"]).is_err());
}

#[rstest]
#[case(0, "warn")]
#[case(1, "info")]
#[case(2, "debug")]
#[case(3, "trace")]
fn verbosity_maps_to_log_level(#[case] verbosity: u8, #[case] level: &str) {
    assert_eq!(log_level_for(verbosity), level);
}

impl Cli {
    fn command_build(&self) -> BuildArgs {
        match &self.command {
            Command::Build(args) => args.clone(),
            other => panic!("expected build command, got {other:?}"),
        }
    }
}
