//! pkgsmith library.
//!
//! Builds WebAssembly process packages into deterministic archives, emits
//! the bootstrap table a host runtime embeds them through, and installs
//! single packages on a running node over its HTTP control endpoint. The
//! `pkgsmith` binary is a thin layer over these modules.
//!
//! # Modules
//!
//! - [`archive`] - Deterministic zip archives, digests and extraction
//! - [`cli`] - Command-line argument definitions
//! - [`component`] - Bindings, build, adapt and embed steps per process
//! - [`config`] - `pkgsmith.toml` loading and defaults
//! - [`error`] - Error type shared by the whole pipeline
//! - [`exec`] - External command invocation seam
//! - [`freshness`] - Modification-time staleness checks
//! - [`frontend`] - Frontend `build.sh` execution
//! - [`install`] - Two-phase install protocol and HTTP transport
//! - [`logging`] - `flexi_logger` bootstrap
//! - [`manifest`] - Bootstrap table and aggregate bundle generation
//! - [`metadata`] - Package metadata descriptors and identity
//! - [`orchestrator`] - Batch build of every discovered package
//! - [`output`] - Human-facing progress lines
//! - [`package`] - Package discovery and process layout
//! - [`process_name`] - Semantic wrapper for process names

pub mod archive;
pub mod cli;
pub mod component;
pub mod config;
pub mod error;
pub mod exec;
pub mod freshness;
pub mod frontend;
pub mod install;
pub mod logging;
pub mod manifest;
pub mod metadata;
pub mod orchestrator;
pub mod output;
pub mod package;
pub mod process_name;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
