//! Shared test utilities for the packager crate.

use crate::error::{PackagerError, Result};
use crate::exec::{CommandExecutor, ToolCommand};
use std::cell::RefCell;
use std::process::{ExitStatus, Output};

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a successful command `Output` with empty stdout and stderr.
#[must_use]
pub fn success_output() -> Output {
    Output {
        status: exit_status(0),
        stdout: Vec::new(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Every invocation is recorded. Successful invocations that declare an
/// output with `-o <path>` get a placeholder file written at that path, so
/// later pipeline steps find the artifacts they expect. A single call can be
/// configured to fail, and a strict call budget can be imposed.
#[derive(Debug, Default)]
pub struct StubExecutor {
    calls: RefCell<Vec<ToolCommand>>,
    fail_at: Option<(usize, String)>,
    max_calls: Option<usize>,
}

impl StubExecutor {
    /// A stub where every command succeeds.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A stub where the `index`-th invocation (zero-based) fails with
    /// `stderr`, and every other invocation succeeds.
    #[must_use]
    pub fn failing_at(index: usize, stderr: &str) -> Self {
        Self {
            fail_at: Some((index, stderr.to_owned())),
            ..Self::default()
        }
    }

    /// Reject any invocation beyond the first `max` with
    /// [`PackagerError::StubMismatch`].
    #[must_use]
    pub fn with_max_calls(mut self, max: usize) -> Self {
        self.max_calls = Some(max);
        self
    }

    /// All commands received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ToolCommand> {
        self.calls.borrow().clone()
    }

    /// Programs and first argument of each call, e.g. `"cargo build"`.
    #[must_use]
    pub fn call_summaries(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| match c.arguments().first() {
                Some(first) => format!("{} {first}", c.program()),
                None => c.program().to_owned(),
            })
            .collect()
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, command: &ToolCommand) -> Result<Output> {
        let index = self.calls.borrow().len();
        if self.max_calls.is_some_and(|max| index >= max) {
            return Err(PackagerError::StubMismatch {
                message: format!("unexpected command invocation: {command}"),
            });
        }
        self.calls.borrow_mut().push(command.clone());

        if let Some((fail_index, stderr)) = &self.fail_at {
            if *fail_index == index {
                return Ok(failure_output(stderr));
            }
        }

        if let Some(path) = command.output_path() {
            let path = match command.working_dir() {
                Some(dir) => dir.join(path),
                None => path.into(),
            };
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, format!("stub output of {}", command.program()))?;
        }
        Ok(success_output())
    }
}
