//! Batch build of every package under the packages root.
//!
//! The orchestrator discovers packages, runs the frontend builds once, then
//! for each package compiles every process into `pkg/` and archives that
//! directory. The first failure aborts the batch; nothing is returned for
//! packages that were already built.

use crate::archive::{ArchiveDigest, archive_directory};
use crate::component::{CompileOutcome, CompilerConfig, ComponentCompiler};
use crate::error::Result;
use crate::exec::CommandExecutor;
use crate::frontend::build_frontends;
use crate::metadata::PackageId;
use crate::output::write_stderr_line;
use crate::package::{PackageDir, discover_packages};
use camino::Utf8PathBuf;
use log::info;
use std::io::Write;

/// One package after a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltPackage {
    /// Package identity from its metadata.
    pub id: PackageId,
    /// Package source directory.
    pub package_dir: Utf8PathBuf,
    /// Archive file name, `<package_dir_name>.zip`.
    pub archive_filename: String,
    /// Deterministic archive of the package's `pkg` directory.
    pub archive_bytes: Vec<u8>,
    /// Metadata descriptor the package was identified by.
    pub metadata_path: Utf8PathBuf,
    /// SHA-256 of `archive_bytes`.
    pub digest: ArchiveDigest,
    /// What happened to each process.
    pub processes: Vec<CompileOutcome>,
}

/// Inputs to one batch build.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    /// Directory whose immediate subdirectories are packages.
    pub packages_dir: Utf8PathBuf,
    /// Frontend directories built before any package.
    pub frontends: Vec<Utf8PathBuf>,
    /// Skip the frontend builds entirely.
    pub skip_frontend: bool,
    /// Settings passed to the component compiler.
    pub compiler: CompilerConfig,
}

/// Drives discovery, compilation and archiving for a batch of packages.
pub struct Orchestrator<'a> {
    plan: &'a BuildPlan,
    executor: &'a dyn CommandExecutor,
    quiet: bool,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator running tools through `executor`.
    #[must_use]
    pub fn new(plan: &'a BuildPlan, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            plan,
            executor,
            quiet: false,
        }
    }

    /// Suppress progress lines on stderr.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build every package, returning results sorted by package identity.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by discovery, a frontend build, a
    /// process compile, or archiving.
    pub fn run(&self, stderr: &mut dyn Write) -> Result<Vec<BuiltPackage>> {
        let packages = discover_packages(&self.plan.packages_dir)?;

        if self.plan.skip_frontend {
            info!("skipping frontend builds");
        } else {
            self.progress(stderr, "Building frontends...");
            build_frontends(self.executor, &self.plan.frontends)?;
        }

        let compiler = ComponentCompiler::new(&self.plan.compiler, self.executor);
        let mut built = Vec::with_capacity(packages.len());
        for package in &packages {
            built.push(self.build_package(&compiler, package, stderr)?);
        }
        Ok(built)
    }

    fn build_package(
        &self,
        compiler: &ComponentCompiler<'_>,
        package: &PackageDir,
        stderr: &mut dyn Write,
    ) -> Result<BuiltPackage> {
        let id = package.id();
        self.progress(stderr, format!("Building {id}..."));

        let mut outcomes = Vec::new();
        for process in package.processes()? {
            outcomes.push(compiler.compile(&process, &package.output_dir)?);
        }

        let archive_bytes = archive_directory(package.output_dir.as_std_path())?;
        let digest = ArchiveDigest::of(&archive_bytes);
        info!(
            "archived {} ({} bytes, sha256 {digest})",
            package.output_dir,
            archive_bytes.len()
        );

        Ok(BuiltPackage {
            id,
            package_dir: package.root.clone(),
            archive_filename: package.archive_filename(),
            archive_bytes,
            metadata_path: package.metadata_path.clone(),
            digest,
            processes: outcomes,
        })
    }

    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.quiet {
            write_stderr_line(stderr, message);
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
