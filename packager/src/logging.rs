//! Logging bootstrap for the CLI.
//!
//! Diagnostics go through the `log` facade; this module installs
//! `flexi_logger` as the backend, writing to stderr. `RUST_LOG`, when set,
//! takes precedence over the level chosen on the command line.

use crate::cli::log_level_for;
use flexi_logger::{Logger, LoggerHandle};

/// Start the logger at the level selected by `verbosity`.
///
/// The returned handle must be kept alive for as long as logging is needed.
///
/// # Errors
///
/// Returns a human-readable message if `RUST_LOG` holds an invalid spec or
/// the backend cannot be started.
pub fn init_logging(verbosity: u8) -> Result<LoggerHandle, String> {
    let level = log_level_for(verbosity);
    Logger::try_with_env_or_str(level)
        .map_err(|err| format!("invalid log specification: {err}"))?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))
}
