//! Two-phase package installation against a running node.
//!
//! A package is delivered with two `POST` requests to the node's control
//! endpoint. The first uploads the archive (`NewPackage`); the second
//! activates it (`Install`). Each request is a JSON envelope addressed to the
//! app store process, carrying the serialized command as a string.
//!
//! The second request is only sent after the first is answered with HTTP
//! 200. Any other status ends the protocol immediately, with no retries.

use crate::archive::{ArchiveDigest, write_archive};
use crate::config::{DEFAULT_CONTROL_PATH, DEFAULT_INSTALL_PROCESS};
use crate::error::{PackagerError, Result};
use crate::metadata::{METADATA_FILE, PackageId, PackageMetadata};
use base64::Engine as _;
use base64::prelude::BASE64_STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// MIME type of the uploaded archive.
const ZIP_MIME: &str = "application/zip";

/// The only status the node uses to signal success.
const HTTP_OK: u16 = 200;

/// Protocol phase, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallPhase {
    /// Uploading the archive with `NewPackage`.
    Upload,
    /// Activating the package with `Install`.
    Install,
}

impl fmt::Display for InstallPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upload => f.write_str("upload phase"),
            Self::Install => f.write_str("install phase"),
        }
    }
}

/// Progress of one installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    /// Nothing sent yet.
    Idle,
    /// The upload request is in flight.
    Uploading,
    /// The node accepted the upload.
    Uploaded,
    /// The node rejected the upload.
    UploadFailed {
        /// Status returned by the node.
        status: u16,
    },
    /// The install request is in flight.
    Installing,
    /// The node accepted the install. Final success state.
    Installed,
    /// The node rejected the install.
    InstallFailed {
        /// Status returned by the node.
        status: u16,
    },
}

impl InstallState {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Installed | Self::UploadFailed { .. } | Self::InstallFailed { .. }
        )
    }
}

/// Commands understood by the app store process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AppStoreCommand {
    /// Register a package and attach its archive.
    NewPackage {
        /// Package identity.
        package: PackageId,
        /// Whether the node should mirror the package for others.
        mirror: bool,
    },
    /// Install and start a previously uploaded package.
    Install(PackageId),
}

/// JSON envelope posted to the control endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallRequest {
    /// Target node; `null` addresses the node serving the request.
    pub node: Option<String>,
    /// Receiving process.
    pub process: String,
    /// Always `false`.
    pub inherit: bool,
    /// Always `null`: the request is fire-and-forget.
    pub expects_response: Option<u64>,
    /// The serialized [`AppStoreCommand`].
    pub ipc: String,
    /// Always `null`.
    pub metadata: Option<String>,
    /// Always `null`.
    pub context: Option<String>,
    /// MIME type of `data`, if any.
    pub mime: Option<String>,
    /// Base64-encoded payload, if any.
    pub data: Option<String>,
}

impl InstallRequest {
    fn envelope(target: &InstallTarget, command: &AppStoreCommand) -> Result<Self> {
        Ok(Self {
            node: target.node.clone(),
            process: target.process.clone(),
            inherit: false,
            expects_response: None,
            ipc: serde_json::to_string(command)?,
            metadata: None,
            context: None,
            mime: None,
            data: None,
        })
    }

    /// Upload request carrying `archive`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Serialization`] if the command cannot be
    /// serialized.
    pub fn new_package(
        target: &InstallTarget,
        package: &PackageId,
        mirror: bool,
        archive: &[u8],
    ) -> Result<Self> {
        let command = AppStoreCommand::NewPackage {
            package: package.clone(),
            mirror,
        };
        Ok(Self {
            mime: Some(ZIP_MIME.to_owned()),
            data: Some(BASE64_STANDARD.encode(archive)),
            ..Self::envelope(target, &command)?
        })
    }

    /// Activation request for `package`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Serialization`] if the command cannot be
    /// serialized.
    pub fn install(target: &InstallTarget, package: &PackageId) -> Result<Self> {
        Self::envelope(target, &AppStoreCommand::Install(package.clone()))
    }
}

/// Where and how to reach a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    /// Base URL of the node, e.g. `http://localhost:8080`.
    pub base_url: String,
    /// Node name placed in the envelope.
    pub node: Option<String>,
    /// Control path appended to `base_url`.
    pub control_path: String,
    /// Process receiving app store commands.
    pub process: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Whether uploaded packages are mirrored.
    pub mirror: bool,
}

impl InstallTarget {
    /// Target `base_url` with default path, process and timeout.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            node: None,
            control_path: DEFAULT_CONTROL_PATH.to_owned(),
            process: DEFAULT_INSTALL_PROCESS.to_owned(),
            timeout: Duration::from_secs(60),
            mirror: false,
        }
    }

    /// Full URL of the control endpoint.
    ///
    /// ```
    /// use pkgsmith::install::InstallTarget;
    ///
    /// let target = InstallTarget::new("http://localhost:8080/");
    /// assert_eq!(target.endpoint(), "http://localhost:8080/rpc:sys:uqbar/message");
    /// ```
    #[must_use]
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if self.control_path.starts_with('/') {
            format!("{base}{}", self.control_path)
        } else {
            format!("{base}/{}", self.control_path)
        }
    }
}

/// A request that never got an HTTP status back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct TransportError {
    /// Description of the connection failure.
    pub reason: String,
}

/// Sends JSON bodies to the control endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait ControlPlane {
    /// Post `body` to `url` and return the HTTP status.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response was received.
    fn post_json(&self, url: &str, body: &str) -> std::result::Result<u16, TransportError>;
}

/// Control plane over HTTP using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    timeout: Duration,
}

impl HttpControlPlane {
    /// Create a transport with the given per-request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// A fresh agent per request, so no connection is reused.
    ///
    /// Redirects are not followed: a 3xx from the control endpoint is
    /// reported as the status of the phase.
    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .max_redirects(0)
            .build();
        ureq::Agent::new_with_config(config)
    }
}

impl ControlPlane for HttpControlPlane {
    fn post_json(&self, url: &str, body: &str) -> std::result::Result<u16, TransportError> {
        match self
            .agent()
            .post(url)
            .header("Content-Type", "application/json")
            .send(body)
        {
            Ok(response) => Ok(response.status().as_u16()),
            Err(ureq::Error::StatusCode(status)) => Ok(status),
            Err(other) => Err(TransportError {
                reason: other.to_string(),
            }),
        }
    }
}

/// Runs the install protocol against one target.
pub struct InstallClient<C: ControlPlane> {
    target: InstallTarget,
    transport: C,
}

impl InstallClient<HttpControlPlane> {
    /// Client talking HTTP to `target`.
    #[must_use]
    pub fn new(target: InstallTarget) -> Self {
        let transport = HttpControlPlane::new(target.timeout);
        Self { target, transport }
    }
}

impl<C: ControlPlane> InstallClient<C> {
    /// Client using a custom transport.
    #[must_use]
    pub fn with_transport(target: InstallTarget, transport: C) -> Self {
        Self { target, transport }
    }

    /// The target this client installs to.
    #[must_use]
    pub fn target(&self) -> &InstallTarget {
        &self.target
    }

    /// Upload `archive` as `package`, then install it.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::ControlPlane`] tagged with the failing phase
    /// if the node answers either request with anything but 200, and
    /// [`PackagerError::Transport`] if a request gets no response. The
    /// install request is never sent after a failed upload.
    pub fn install(&self, package: &PackageId, archive: &[u8]) -> Result<()> {
        let mut state = InstallState::Idle;
        loop {
            state = match state {
                InstallState::Idle => InstallState::Uploading,
                InstallState::Uploading => {
                    let request = InstallRequest::new_package(
                        &self.target,
                        package,
                        self.target.mirror,
                        archive,
                    )?;
                    match self.send(package, InstallPhase::Upload, &request)? {
                        HTTP_OK => InstallState::Uploaded,
                        status => InstallState::UploadFailed { status },
                    }
                }
                InstallState::Uploaded => InstallState::Installing,
                InstallState::Installing => {
                    let request = InstallRequest::install(&self.target, package)?;
                    match self.send(package, InstallPhase::Install, &request)? {
                        HTTP_OK => InstallState::Installed,
                        status => InstallState::InstallFailed { status },
                    }
                }
                InstallState::Installed => {
                    info!("installed {package}");
                    return Ok(());
                }
                InstallState::UploadFailed { status } => {
                    return Err(rejected(package, InstallPhase::Upload, status));
                }
                InstallState::InstallFailed { status } => {
                    return Err(rejected(package, InstallPhase::Install, status));
                }
            };
            debug!("{package}: {state:?}");
        }
    }

    fn send(
        &self,
        package: &PackageId,
        phase: InstallPhase,
        request: &InstallRequest,
    ) -> Result<u16> {
        let url = self.target.endpoint();
        let body = serde_json::to_string(request)?;
        debug!("{phase} for {package}: POST {url} ({} bytes)", body.len());
        self.transport
            .post_json(&url, &body)
            .map_err(|e| PackagerError::Transport {
                package: package.to_string(),
                phase,
                url,
                reason: e.reason,
            })
    }
}

fn rejected(package: &PackageId, phase: InstallPhase, status: u16) -> PackagerError {
    PackagerError::ControlPlane {
        package: package.to_string(),
        phase,
        status,
    }
}

/// Outcome of [`deploy_package_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    /// Installed package.
    pub id: PackageId,
    /// Archive written before uploading.
    pub archive_path: Utf8PathBuf,
    /// Digest of the uploaded archive.
    pub digest: ArchiveDigest,
}

/// Archive the package directory `pkg_dir` and install it through `client`.
///
/// The archive is written to `<parent>/target/<package>:<publisher>.zip`,
/// where `<parent>` is the directory containing `pkg_dir`.
///
/// # Errors
///
/// Returns [`PackagerError::MissingMetadata`] if `pkg_dir` lacks a usable
/// `metadata.json`, archive errors, and any error from
/// [`InstallClient::install`].
pub fn deploy_package_dir<C: ControlPlane>(
    pkg_dir: &Utf8Path,
    client: &InstallClient<C>,
) -> Result<DeployReport> {
    if !pkg_dir.is_dir() {
        return Err(PackagerError::DirectoryNotFound {
            path: pkg_dir.to_owned(),
        });
    }
    let metadata = PackageMetadata::load(&pkg_dir.join(METADATA_FILE))?;
    let id = metadata.id();

    let pkg_dir = pkg_dir.canonicalize_utf8()?;
    let parent = pkg_dir.parent().unwrap_or(pkg_dir.as_path());
    let archive_path = parent.join("target").join(format!("{id}.zip"));
    let archive = write_archive(pkg_dir.as_std_path(), archive_path.as_std_path())?;
    let digest = ArchiveDigest::of(&archive);
    info!("archived {pkg_dir} to {archive_path} (sha256 {digest})");

    client.install(&id, &archive)?;
    Ok(DeployReport {
        id,
        archive_path,
        digest,
    })
}

#[cfg(test)]
#[path = "install_tests.rs"]
mod tests;
