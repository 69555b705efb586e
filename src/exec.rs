//! Process-execution seam.
//!
//! Every external command the build step runs goes through [`Executor`], so
//! tests can swap in [`crate::mockprocess::ProcessMocker`] without touching
//! the production code path.

use std::io::{ErrorKind, Write as _};
use std::process::{Command, Stdio};
use std::thread;

use log::debug;
use thiserror::Error;

/// Errors raised by the execution seam itself.
///
/// A command that runs and exits non-zero is *not* an error here; callers
/// inspect [`ExecOutput::exit_code`] for that.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("i/o error while running `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unexpected invocation `{command}`: no expected commands remain")]
    UnexpectedInvocation { command: String },
    #[error("wrong command: expected a match for /{expected}/, got `{actual}`")]
    WrongCommand { expected: String, actual: String },
}

/// A single command invocation presented to an [`Executor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl Invocation {
    pub fn new<P, I, A>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    /// The literal command line: program and arguments joined by spaces.
    ///
    /// # Examples
    ///
    /// ```
    /// use rubystep::exec::Invocation;
    ///
    /// let inv = Invocation::new("gem", ["install", "csv"]);
    /// assert_eq!(inv.command_line(), "gem install csv");
    /// ```
    #[must_use]
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a completed command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs external commands on behalf of the build step.
pub trait Executor {
    /// Run `invocation` to completion and capture its output.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] when the command cannot be run at all. A
    /// non-zero exit is reported through the returned [`ExecOutput`].
    fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError>;
}

/// Production backend spawning real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl Executor for SystemExecutor {
    fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError> {
        let command = invocation.command_line();
        let io_err = |source| ExecError::Io {
            command: command.clone(),
            source,
        };
        debug!("running `{command}`");

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        // Feed stdin from its own thread so a child echoing large input
        // cannot fill its stdout pipe while we are still writing.
        let writer = invocation
            .stdin
            .clone()
            .zip(child.stdin.take())
            .map(|(input, mut pipe)| {
                thread::spawn(move || match pipe.write_all(input.as_bytes()) {
                    // The child exited without reading all of its input.
                    Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
                    other => other,
                })
            });

        let output = child.wait_with_output().map_err(io_err)?;
        if let Some(handle) = writer {
            match handle.join() {
                Ok(written) => written.map_err(io_err)?,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        // Signal-terminated processes carry no exit code.
        let exit_code = output.status.code().unwrap_or(-1);
        debug!("`{command}` exited with {exit_code}");
        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
        })
    }
}
