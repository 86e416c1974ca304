// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! External command execution.
//!
//! Nothing in the profile core spawns processes on its own. Anything that
//! needs to talk to an outside program goes through [`CommandRunner`], so
//! tests can swap in a canned runner instead.

use std::{
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument};

/// Captured result of a finished command.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Everything the command wrote to stdout.
    pub stdout: String,

    /// Everything the command wrote to stderr.
    pub stderr: String,

    /// Exit code, or `None` if the command was killed by a signal.
    pub code: Option<i32>,
}

impl CommandOutput {
    /// Construct output of a command that exited cleanly.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            code: Some(0),
        }
    }

    /// Construct output of a command that failed.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            code: Some(code),
        }
    }

    /// Check if command exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Combined stdout and stderr, with trailing newline chomped.
    pub fn message(&self) -> String {
        let mut message = String::new();

        if !self.stdout.is_empty() {
            message.push_str(format!("stdout: {}", self.stdout).as_str());
        }

        if !self.stderr.is_empty() {
            message.push_str(format!("stderr: {}", self.stderr).as_str());
        }

        // INVARIANT: Chomp trailing newlines.
        message
            .strip_suffix("\r\n")
            .or(message.strip_suffix('\n'))
            .map(ToString::to_string)
            .unwrap_or(message)
    }
}

/// Layer of indirection for running external commands.
pub trait CommandRunner {
    /// Run program to completion and capture its output.
    ///
    /// A non-zero exit status is not an error at this level. Callers decide
    /// what a failed command means through [`CommandOutput::success`].
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput>;
}

/// Run commands as child processes of the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    /// Construct new system command runner.
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    #[instrument(skip(self), level = "debug")]
    fn run(&self, program: &Path, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| CommandError::Spawn {
                source: err,
                program: program.to_path_buf(),
            })?;

        let output = CommandOutput {
            stdout: String::from_utf8_lossy(output.stdout.as_slice()).into_owned(),
            stderr: String::from_utf8_lossy(output.stderr.as_slice()).into_owned(),
            code: output.status.code(),
        };
        debug!("{:?} exited with {:?}", program.display(), output.code);

        Ok(output)
    }
}

/// Command execution error types.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Program cannot be started at all.
    #[error("failed to run {:?}", program.display())]
    Spawn {
        #[source]
        source: std::io::Error,
        program: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = CommandError> = std::result::Result<T, E>;
