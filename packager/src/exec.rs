//! External tool invocation.
//!
//! Every toolchain call (`cargo`, `wasm-tools`, frontend build scripts) goes
//! through [`CommandExecutor`], built from an explicit argument vector and
//! never through a shell string. The executor waits for the child to exit
//! and hands back its captured output, so exit status is observed on every
//! path.

use crate::error::{PackagerError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fmt;
use std::process::{Command, Output};

/// A fully specified external command: program, arguments, working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<Utf8PathBuf>,
}

impl ToolCommand {
    /// Start building a command for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Run the command from `dir` instead of the caller's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// The program to execute.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The argument vector, excluding the program itself.
    #[must_use]
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// The working directory override, if any.
    #[must_use]
    pub fn working_dir(&self) -> Option<&Utf8Path> {
        self.current_dir.as_deref()
    }

    /// Value following the first `-o` flag, i.e. the declared output path.
    #[must_use]
    pub fn output_path(&self) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == "-o")
            .and_then(|idx| self.args.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor {
    /// Runs a command to completion and returns its captured output.
    ///
    /// A non-zero exit is not an error at this level; callers inspect
    /// [`Output::status`] and decide which failure it represents.
    ///
    /// # Errors
    ///
    /// Returns any I/O error encountered while spawning or waiting on the
    /// child process.
    fn run(&self, command: &ToolCommand) -> Result<Output>;
}

/// Executes commands on the host system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, command: &ToolCommand) -> Result<Output> {
        debug!("running {command}");
        let mut cmd = Command::new(command.program());
        cmd.args(command.arguments());
        if let Some(dir) = command.working_dir() {
            cmd.current_dir(dir);
        }
        cmd.output().map_err(PackagerError::from)
    }
}

/// Summarise why a command failed, preferring its stderr.
#[must_use]
pub fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        format!("exited with {}", output.status)
    } else {
        trimmed.to_owned()
    }
}
