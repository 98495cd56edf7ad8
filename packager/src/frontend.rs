//! Frontend asset builds.
//!
//! Some packages ship a web UI whose assets are produced by a `build.sh`
//! script in the frontend's directory. Those scripts run once per build,
//! before any package is compiled, so freshly built assets land in the
//! package output directories that get archived.

use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, ToolCommand, failure_reason};
use camino::Utf8PathBuf;
use log::{info, warn};

/// Name of the build script expected in each frontend directory.
pub const BUILD_SCRIPT: &str = "build.sh";

/// Result of attempting one frontend build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrontendOutcome {
    /// The script ran and exited successfully.
    Built(Utf8PathBuf),
    /// No build script was found; the frontend was skipped.
    Skipped(Utf8PathBuf),
}

/// Run `sh ./build.sh` in each frontend directory, in order.
///
/// A directory without a build script is skipped with a warning.
///
/// # Errors
///
/// Returns [`PackagerError::FrontendBuild`] for the first script that fails
/// to start or exits non-zero; later frontends are not built.
pub fn build_frontends(
    executor: &dyn CommandExecutor,
    frontends: &[Utf8PathBuf],
) -> Result<Vec<FrontendOutcome>> {
    let mut outcomes = Vec::with_capacity(frontends.len());
    for frontend in frontends {
        if !frontend.join(BUILD_SCRIPT).is_file() {
            warn!("no {BUILD_SCRIPT} in {frontend}; skipping frontend build");
            outcomes.push(FrontendOutcome::Skipped(frontend.clone()));
            continue;
        }

        info!("building frontend {frontend}");
        let command = ToolCommand::new("sh")
            .arg(format!("./{BUILD_SCRIPT}"))
            .current_dir(frontend.clone());
        let output = executor
            .run(&command)
            .map_err(|e| PackagerError::FrontendBuild {
                frontend: frontend.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(PackagerError::FrontendBuild {
                frontend: frontend.clone(),
                reason: failure_reason(&output),
            });
        }
        outcomes.push(FrontendOutcome::Built(frontend.clone()));
    }
    Ok(outcomes)
}
