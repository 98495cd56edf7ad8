//! pkgsmith CLI entrypoint.
//!
//! Builds every package under the packages root into its archive, the
//! bootstrap table and the aggregate bundle, or installs a single package
//! directory on a running node.

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use pkgsmith::archive::{ArchiveDigest, write_archive};
use pkgsmith::cli::{ArchiveArgs, BuildArgs, Cli, Command, InstallArgs};
use pkgsmith::component::{CompileOutcome, CompilerConfig, normalize_features};
use pkgsmith::config::{CONFIG_FILE, LEGACY_CONTROL_PATH, PackagerConfig};
use pkgsmith::error::{PackagerError, Result};
use pkgsmith::exec::SystemCommandExecutor;
use pkgsmith::install::{InstallClient, InstallTarget, deploy_package_dir};
use pkgsmith::logging::init_logging;
use pkgsmith::manifest::{ManifestGenerator, bundle_file_name};
use pkgsmith::orchestrator::{BuildPlan, Orchestrator};
use pkgsmith::output::{
    build_success_message, install_success_message, package_line, write_stderr_line,
};
use std::io::Write;
use std::time::Duration;

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let _logger = match init_logging(cli.verbosity) {
        Ok(handle) => Some(handle),
        Err(message) => {
            write_stderr_line(&mut stderr, format!("warning: {message}"));
            None
        }
    };
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Command::Build(args) => run_build(&config, args, cli.quiet, stderr),
        Command::Install(args) => run_install(&config, args, cli.quiet, stderr),
        Command::Archive(args) => run_archive(args, cli.quiet, stderr),
    }
}

/// Loads configuration and resolves its paths against the working directory.
fn load_config(explicit: Option<&Utf8Path>) -> Result<PackagerConfig> {
    let cwd = current_dir()?;
    let path = explicit.map_or_else(|| cwd.join(CONFIG_FILE), Utf8Path::to_path_buf);
    Ok(PackagerConfig::load_or_default(&path)?.resolved_against(&cwd))
}

fn current_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|path| PackagerError::NonUtf8Path {
        path: path.display().to_string(),
    })
}

fn run_build(
    config: &PackagerConfig,
    args: &BuildArgs,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let plan = BuildPlan {
        packages_dir: config.packages_dir.clone(),
        frontends: config.frontends.clone(),
        skip_frontend: args.skip_build_frontend,
        compiler: CompilerConfig {
            wit_dir: config.wit_dir.clone(),
            adapter: config.adapter.clone(),
            wasm_target: config.wasm_target.clone(),
            world: config.world.clone(),
            features: normalize_features(&args.features),
            force_rebuild: args.force || config.force_rebuild,
        },
    };

    let executor = SystemCommandExecutor;
    let built = Orchestrator::new(&plan, &executor)
        .quiet(quiet)
        .run(stderr)?;
    let bundle_name = bundle_file_name(&plan.compiler.features, args.output_filename.as_deref());
    let output = ManifestGenerator::new(config.target_dir.clone())
        .bundle_name(bundle_name)
        .generate(&built)?;

    if !quiet {
        for package in &built {
            let skipped = package
                .processes
                .iter()
                .filter(|p| matches!(p, CompileOutcome::UpToDate { .. }))
                .count();
            if skipped > 0 {
                write_stderr_line(
                    stderr,
                    format!("{} ({skipped} process(es) up to date)", package_line(package)),
                );
            } else {
                write_stderr_line(stderr, package_line(package));
            }
        }
        write_stderr_line(stderr, build_success_message(built.len(), &output.bundle_path));
    }
    Ok(())
}

fn run_install(
    config: &PackagerConfig,
    args: &InstallArgs,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let control_path = if args.legacy_path {
        LEGACY_CONTROL_PATH.to_owned()
    } else {
        config.install.control_path.clone()
    };
    let target = InstallTarget {
        node: args.node.clone(),
        control_path,
        process: config.install.process.clone(),
        timeout: Duration::from_secs(config.install.timeout_secs),
        mirror: args.mirror,
        ..InstallTarget::new(args.url.clone())
    };

    let client = InstallClient::new(target);
    if !quiet {
        write_stderr_line(
            stderr,
            format!(
                "Installing {} via {}",
                args.pkg_dir,
                client.target().endpoint()
            ),
        );
    }
    let report = deploy_package_dir(&args.pkg_dir, &client)?;
    if !quiet {
        write_stderr_line(stderr, install_success_message(&report.id));
    }
    Ok(())
}

fn run_archive(args: &ArchiveArgs, quiet: bool, stderr: &mut dyn Write) -> Result<()> {
    if !args.dir.is_dir() {
        return Err(PackagerError::DirectoryNotFound {
            path: args.dir.clone(),
        });
    }
    let bytes = write_archive(args.dir.as_std_path(), args.output.as_std_path())?;
    if !quiet {
        write_stderr_line(
            stderr,
            format!("{} sha256 {}", args.output, ArchiveDigest::of(&bytes)),
        );
    }
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::expect_used, reason = "tests fail fast with a message on unexpected errors")]

    use super::*;
    use pkgsmith::install::InstallPhase;

    #[test]
    fn exit_code_for_run_result_returns_zero_on_success() {
        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Ok(()), &mut stderr);
        assert_eq!(exit_code, 0);
        assert!(stderr.is_empty());
    }

    #[test]
    fn exit_code_for_run_result_prints_error_and_returns_one() {
        let err = PackagerError::ControlPlane {
            package: "chess:uqbar.os".to_owned(),
            phase: InstallPhase::Upload,
            status: 500,
        };

        let mut stderr = Vec::new();
        let exit_code = exit_code_for_run_result(Err(err), &mut stderr);
        assert_eq!(exit_code, 1);

        let stderr_text = String::from_utf8(stderr).expect("stderr was not UTF-8");
        assert!(stderr_text.contains("upload phase failed for chess:uqbar.os"));
    }

    #[test]
    fn archive_of_missing_dir_fails() {
        let args = ArchiveArgs {
            dir: Utf8PathBuf::from("/nonexistent/pkg"),
            output: Utf8PathBuf::from("/nonexistent/out.zip"),
        };
        let err = run_archive(&args, true, &mut Vec::new()).expect_err("missing dir");
        assert!(matches!(err, PackagerError::DirectoryNotFound { .. }));
    }

    #[test]
    fn archive_prints_digest() {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        std::fs::create_dir_all(root.join("pkg")).expect("mkdir");
        std::fs::write(root.join("pkg/chess.wasm"), b"\0asm").expect("write");
        let args = ArchiveArgs {
            dir: root.join("pkg"),
            output: root.join("chess.zip"),
        };

        let mut stderr = Vec::new();
        run_archive(&args, false, &mut stderr).expect("archive");

        let bytes = std::fs::read(root.join("chess.zip")).expect("archive written");
        let text = String::from_utf8(stderr).expect("utf8");
        assert!(text.contains(ArchiveDigest::of(&bytes).as_str()));
    }
}
