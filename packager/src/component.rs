//! Component-model build pipeline for process crates.
//!
//! Each process crate is turned into a self-describing component in four
//! steps, each a separate external call:
//!
//! 1. [`CompileStep::Bindings`] compiles the shared interface description to
//!    its binary form and stages it, a copy of the interface sources, and an
//!    empty `world` marker under the process's own bindings directory.
//! 2. [`CompileStep::Build`] runs `cargo build` for the WASI target.
//! 3. [`CompileStep::Adapt`] links the core module against the preview1
//!    adapter with `wasm-tools component new`.
//! 4. [`CompileStep::Embed`] embeds the `process` world with
//!    `wasm-tools component embed` into a staged file, which is copied into
//!    the package output directory only once every step has succeeded.
//!
//! Intermediate modules stay in the crate's `target/` directory whether or
//! not a later step fails.
//!
//! A successful build records the target, world and feature set it used in
//! a `build-config` stamp beside the staged bindings. A process is only
//! skipped as up to date when that stamp matches the current settings.

use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, ToolCommand, failure_reason};
use crate::freshness::is_up_to_date;
use crate::metadata::PackageId;
use crate::process_name::ProcessName;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fmt;
use std::fs;
use walkdir::WalkDir;

/// One independently failable step of the component pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStep {
    /// Compile and stage interface bindings.
    Bindings,
    /// Compile the crate to a core module.
    Build,
    /// Adapt the core module to the component model.
    Adapt,
    /// Embed the world and publish the component.
    Embed,
}

impl fmt::Display for CompileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bindings => "bindings",
            Self::Build => "build",
            Self::Adapt => "adapt",
            Self::Embed => "embed",
        };
        f.write_str(name)
    }
}

/// Settings shared by every process compiled in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Shared interface description directory.
    pub wit_dir: Utf8PathBuf,
    /// WASI preview1 adapter module.
    pub adapter: Utf8PathBuf,
    /// Rust target triple, e.g. `wasm32-wasi`.
    pub wasm_target: String,
    /// World embedded into every component.
    pub world: String,
    /// Cargo features enabled on every process crate.
    pub features: Vec<String>,
    /// Rebuild even when the component is newer than its inputs.
    pub force_rebuild: bool,
}

/// File recording the settings of the last successful build.
pub const BUILD_STAMP_FILE: &str = "build-config";

/// A process crate to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSource {
    /// Package the process belongs to.
    pub package: PackageId,
    /// Process name; also the crate directory name.
    pub name: ProcessName,
    /// Crate directory holding `Cargo.toml`.
    pub dir: Utf8PathBuf,
}

impl ProcessSource {
    /// Describe the crate at `dir` within `package`, naming the process after
    /// the directory.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::DirectoryNotFound`] if `dir` has no final
    /// path component to name the process after.
    pub fn from_dir(package: PackageId, dir: &Utf8Path) -> Result<Self> {
        let name = dir
            .file_name()
            .ok_or_else(|| PackagerError::DirectoryNotFound {
                path: dir.to_owned(),
            })?;
        Ok(Self {
            package,
            name: ProcessName::from(name),
            dir: dir.to_owned(),
        })
    }

    /// Per-process directory receiving staged interface bindings.
    #[must_use]
    pub fn bindings_dir(&self) -> Utf8PathBuf {
        self.dir.join("target").join("bindings").join(self.name.as_str())
    }

    /// Stamp describing the settings of the last successful build.
    #[must_use]
    pub fn build_stamp_path(&self) -> Utf8PathBuf {
        self.bindings_dir().join(BUILD_STAMP_FILE)
    }

    fn release_dir(&self, wasm_target: &str) -> Utf8PathBuf {
        self.dir.join("target").join(wasm_target).join("release")
    }
}

/// Paths of every artifact produced for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentArtifacts {
    /// Process the artifacts belong to.
    pub process: ProcessName,
    /// Core module emitted by cargo.
    pub core_module: Utf8PathBuf,
    /// Component-model module emitted by the adapter step.
    pub adapted_module: Utf8PathBuf,
    /// Final embedded component in the package output directory.
    pub component: Utf8PathBuf,
}

/// What happened to one process during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// All four steps ran and the component was published.
    Built(ComponentArtifacts),
    /// The existing component is newer than every input and was built with
    /// the current settings; nothing ran.
    UpToDate {
        /// Process that was skipped.
        process: ProcessName,
        /// The existing component.
        component: Utf8PathBuf,
    },
}

/// Compiles process crates into components.
pub struct ComponentCompiler<'a> {
    config: &'a CompilerConfig,
    executor: &'a dyn CommandExecutor,
}

impl<'a> ComponentCompiler<'a> {
    /// Create a compiler running tools through `executor`.
    #[must_use]
    pub fn new(config: &'a CompilerConfig, executor: &'a dyn CommandExecutor) -> Self {
        Self { config, executor }
    }

    /// Compile `process` and publish its component into `out_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ToolInvocation`] naming the package, the
    /// process and the failing step; no later step runs and nothing is
    /// written to `out_dir`.
    pub fn compile(&self, process: &ProcessSource, out_dir: &Utf8Path) -> Result<CompileOutcome> {
        let component = out_dir.join(process.name.component_file_name());

        if !self.config.force_rebuild && self.is_fresh(process, &component) {
            info!("{} is up to date", process.name);
            return Ok(CompileOutcome::UpToDate {
                process: process.name.clone(),
                component,
            });
        }

        self.stage_bindings(process)?;
        let core_module = self.build(process)?;
        let adapted_module = self.adapt(process, &core_module)?;
        self.embed(process, &adapted_module, &component)?;
        fs::write(process.build_stamp_path(), self.build_stamp())
            .map_err(|e| step_error(process, CompileStep::Embed, &e))?;

        Ok(CompileOutcome::Built(ComponentArtifacts {
            process: process.name.clone(),
            core_module,
            adapted_module,
            component,
        }))
    }

    /// Step 1: compile the interface description and stage bindings input.
    fn stage_bindings(&self, process: &ProcessSource) -> Result<()> {
        let step = CompileStep::Bindings;
        let bindings = process.bindings_dir();
        fs::create_dir_all(&bindings).map_err(|e| step_error(process, step, &e))?;

        let command = ToolCommand::new("wasm-tools")
            .args(["component", "wit"])
            .arg(self.config.wit_dir.as_str())
            .args(["-o", bindings.join("target.wasm").as_str(), "--wasm"]);
        self.run_step(process, step, &command)?;

        copy_tree(&self.config.wit_dir, &bindings.join("wit"))
            .map_err(|e| step_error(process, step, &e))?;
        fs::write(bindings.join("world"), b"").map_err(|e| step_error(process, step, &e))?;
        Ok(())
    }

    /// Step 2: compile the crate to a core module.
    fn build(&self, process: &ProcessSource) -> Result<Utf8PathBuf> {
        let mut command = ToolCommand::new("cargo")
            .args(["build", "--release", "--no-default-features"])
            .arg(format!("--manifest-path={}", process.dir.join("Cargo.toml")))
            .args(["--target", self.config.wasm_target.as_str()]);
        if !self.config.features.is_empty() {
            command = command.args(["--features".to_owned(), self.config.features.join(",")]);
        }
        self.run_step(process, CompileStep::Build, &command)?;

        Ok(process
            .release_dir(&self.config.wasm_target)
            .join(format!("{}.wasm", process.name.artifact_stem())))
    }

    /// Step 3: adapt the core module to the component model.
    fn adapt(&self, process: &ProcessSource, core_module: &Utf8Path) -> Result<Utf8PathBuf> {
        let adapted = process
            .release_dir(&self.config.wasm_target)
            .join(format!("{}_adapted.wasm", process.name.artifact_stem()));
        let command = ToolCommand::new("wasm-tools")
            .args(["component", "new", core_module.as_str()])
            .args(["-o", adapted.as_str()])
            .args(["--adapt", self.config.adapter.as_str()]);
        self.run_step(process, CompileStep::Adapt, &command)?;
        Ok(adapted)
    }

    /// Step 4: embed the world, then publish the component.
    fn embed(
        &self,
        process: &ProcessSource,
        adapted: &Utf8Path,
        component: &Utf8Path,
    ) -> Result<()> {
        let step = CompileStep::Embed;
        let staged = process
            .release_dir(&self.config.wasm_target)
            .join(format!("{}_component.wasm", process.name.artifact_stem()));
        let command = ToolCommand::new("wasm-tools")
            .args(["component", "embed", self.config.wit_dir.as_str()])
            .args(["--world", self.config.world.as_str()])
            .arg(adapted.as_str())
            .args(["-o", staged.as_str()]);
        self.run_step(process, step, &command)?;

        if let Some(parent) = component.parent() {
            fs::create_dir_all(parent).map_err(|e| step_error(process, step, &e))?;
        }
        fs::copy(&staged, component).map_err(|e| step_error(process, step, &e))?;
        debug!("published {component}");
        Ok(())
    }

    fn run_step(
        &self,
        process: &ProcessSource,
        step: CompileStep,
        command: &ToolCommand,
    ) -> Result<()> {
        debug!("{} [{step}]: {command}", process.name);
        let output = self
            .executor
            .run(command)
            .map_err(|e| step_error(process, step, &e))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(PackagerError::ToolInvocation {
                package: process.package.clone(),
                process: process.name.clone(),
                step,
                reason: failure_reason(&output),
            })
        }
    }

    /// Settings that change the component without touching its sources.
    fn build_stamp(&self) -> String {
        let mut features = self.config.features.clone();
        features.sort();
        features.dedup();
        format!(
            "target = {}\nworld = {}\nfeatures = {}\n",
            self.config.wasm_target,
            self.config.world,
            features.join(",")
        )
    }

    fn is_fresh(&self, process: &ProcessSource, component: &Utf8Path) -> bool {
        match fs::read_to_string(process.build_stamp_path()) {
            Ok(stamp) if stamp == self.build_stamp() => {}
            Ok(_) => {
                debug!("{} was built with other settings; rebuilding", process.name);
                return false;
            }
            Err(_) => return false,
        }
        let shared = [self.config.wit_dir.as_path(), self.config.adapter.as_path()];
        is_up_to_date(&process.dir, &shared, component).unwrap_or_else(|e| {
            debug!("freshness check failed for {}: {e}; rebuilding", process.name);
            false
        })
    }
}

fn step_error(process: &ProcessSource, step: CompileStep, err: &dyn fmt::Display) -> PackagerError {
    PackagerError::ToolInvocation {
        package: process.package.clone(),
        process: process.name.clone(),
        step,
        reason: err.to_string(),
    }
}

/// Recursively copy the directory `from` to `to`.
fn copy_tree(from: &Utf8Path, to: &Utf8Path) -> std::io::Result<()> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let dest = to.as_std_path().join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Split feature flags given repeatedly or comma-joined into a flat list.
///
/// ```
/// use pkgsmith::component::normalize_features;
///
/// let flags = vec!["simulation-mode,llm".to_owned(), " debug ".to_owned()];
/// assert_eq!(normalize_features(&flags), vec!["simulation-mode", "llm", "debug"]);
/// ```
#[must_use]
pub fn normalize_features(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|flag| flag.split(','))
        .map(str::trim)
        .filter(|feature| !feature.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
#[path = "component_tests.rs"]
mod tests;
