//! Build and install configuration.
//!
//! Settings come from an optional `pkgsmith.toml` at the workspace root.
//! Every field has a default, so an absent file is equivalent to an empty
//! one. Relative paths are resolved against the workspace root; CLI flags
//! override file values after loading.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// Default configuration file name, looked up in the workspace root.
pub const CONFIG_FILE: &str = "pkgsmith.toml";

/// Control-plane path of current nodes.
pub const DEFAULT_CONTROL_PATH: &str = "/rpc:sys:uqbar/message";

/// Control-plane path of older nodes.
pub const LEGACY_CONTROL_PATH: &str = "/rpc/message";

/// Process that receives package lifecycle commands.
pub const DEFAULT_INSTALL_PROCESS: &str = "main:app_store:uqbar";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackagerConfig {
    /// Directory whose immediate subdirectories are packages.
    pub packages_dir: Utf8PathBuf,
    /// Directory receiving per-package archives, the bootstrap table and the
    /// aggregate bundle.
    pub target_dir: Utf8PathBuf,
    /// Shared interface description directory.
    pub wit_dir: Utf8PathBuf,
    /// WASI preview1 adapter module.
    pub adapter: Utf8PathBuf,
    /// Frontend directories whose `build.sh` runs before package builds.
    pub frontends: Vec<Utf8PathBuf>,
    /// Rust target triple for process crates.
    pub wasm_target: String,
    /// World embedded into every component.
    pub world: String,
    /// Rebuild processes even when their component is up to date.
    pub force_rebuild: bool,
    /// Control-plane settings.
    pub install: InstallConfig,
}

impl Default for PackagerConfig {
    fn default() -> Self {
        Self {
            packages_dir: Utf8PathBuf::from("packages"),
            target_dir: Utf8PathBuf::from("target"),
            wit_dir: Utf8PathBuf::from("wit"),
            adapter: Utf8PathBuf::from("wasi_snapshot_preview1.wasm"),
            frontends: vec![
                Utf8PathBuf::from("src/register-ui"),
                Utf8PathBuf::from("packages/app_store/ui"),
                Utf8PathBuf::from("packages/homepage/ui"),
            ],
            wasm_target: "wasm32-wasi".to_owned(),
            world: "process".to_owned(),
            force_rebuild: false,
            install: InstallConfig::default(),
        }
    }
}

/// Control-plane settings for `pkgsmith install`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstallConfig {
    /// HTTP path accepting JSON-wrapped commands.
    pub control_path: String,
    /// Process addressed by install commands.
    pub process: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            control_path: DEFAULT_CONTROL_PATH.to_owned(),
            process: DEFAULT_INSTALL_PROCESS.to_owned(),
            timeout_secs: 60,
        }
    }
}

impl PackagerConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Config`] if the text is not valid TOML or
    /// contains unknown keys.
    pub fn parse(contents: &str, path: &Utf8Path) -> Result<Self> {
        toml::from_str(contents).map_err(|e| PackagerError::Config {
            path: path.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Config`] if the file exists but is invalid,
    /// or [`PackagerError::Io`] if it cannot be read.
    pub fn load_or_default(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no configuration at {path}; using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, path)
    }

    /// Rebase every relative path onto `root`.
    #[must_use]
    pub fn resolved_against(mut self, root: &Utf8Path) -> Self {
        let rebase = |path: Utf8PathBuf| {
            if path.is_absolute() {
                path
            } else {
                root.join(path)
            }
        };
        self.packages_dir = rebase(self.packages_dir);
        self.target_dir = rebase(self.target_dir);
        self.wit_dir = rebase(self.wit_dir);
        self.adapter = rebase(self.adapter);
        self.frontends = self.frontends.into_iter().map(rebase).collect();
        self
    }
}
