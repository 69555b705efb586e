//! Ordered command expectations for tests.
//!
//! [`ProcessMocker`] stands in for [`SystemExecutor`](crate::exec::SystemExecutor):
//! it holds a FIFO queue of [`CommandPattern`]s and checks each invocation
//! against the head of the queue. Nothing is ever spawned.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;
use regex::Regex;
use thiserror::Error;

use crate::exec::{ExecError, ExecOutput, Executor, Invocation};

/// Failures reported by [`ProcessMocker::verify`].
#[derive(Debug, Error)]
pub enum MockError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("{} expected command(s) never ran: {}", .remaining.len(), .remaining.join(", "))]
    Unsatisfied { remaining: Vec<String> },
}

/// A regular expression over the literal command line, with the canned
/// result to hand back when it matches.
///
/// Matching is containment, not equality: `gem install csv` matches
/// `gem install csv --no-document`.
#[derive(Clone)]
pub struct CommandPattern {
    re: Regex,
    stdin: Option<String>,
    output: ExecOutput,
}

impl CommandPattern {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] when `pattern` is not a valid regular
    /// expression, so broken scenarios fail before anything runs.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(pattern)?,
            stdin: None,
            output: ExecOutput::default(),
        })
    }

    #[must_use]
    pub fn with_stdout(mut self, stdout: impl Into<String>) -> Self {
        self.output.stdout = stdout.into();
        self
    }

    #[must_use]
    pub fn with_stderr(mut self, stderr: impl Into<String>) -> Self {
        self.output.stderr = stderr.into();
        self
    }

    #[must_use]
    pub const fn with_exit_code(mut self, exit_code: i32) -> Self {
        self.output.exit_code = exit_code;
        self
    }

    /// Require the invocation to supply exactly `stdin`.
    #[must_use]
    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        self.re.as_str()
    }

    #[must_use]
    pub fn matches(&self, invocation: &Invocation) -> bool {
        self.re.is_match(&invocation.command_line())
            && self
                .stdin
                .as_ref()
                .is_none_or(|want| invocation.stdin.as_ref() == Some(want))
    }

    #[must_use]
    pub fn output(&self) -> ExecOutput {
        self.output.clone()
    }
}

impl fmt::Debug for CommandPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPattern")
            .field("pattern", &self.pattern())
            .field("stdin", &self.stdin)
            .field("exit_code", &self.output.exit_code)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<CommandPattern>,
    log: Vec<Invocation>,
    failures: Vec<ExecError>,
}

/// FIFO command mock implementing [`Executor`].
///
/// Each instance belongs to exactly one scenario.
#[derive(Debug, Default)]
pub struct ProcessMocker {
    state: Mutex<MockState>,
}

impl ProcessMocker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_expectations(patterns: impl IntoIterator<Item = CommandPattern>) -> Self {
        let mocker = Self::new();
        mocker.expect(patterns);
        mocker
    }

    // A panic inside a scenario must not hide the mock state from teardown.
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the expectation queue.
    pub fn expect(&self, patterns: impl IntoIterator<Item = CommandPattern>) {
        let mut state = self.state();
        state.queue = patterns.into_iter().collect();
        state.log.clear();
        state.failures.clear();
    }

    /// Invocations matched so far, in order.
    #[must_use]
    pub fn invocations(&self) -> Vec<Invocation> {
        self.state().log.clone()
    }

    /// Number of expectations not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.state().queue.len()
    }

    /// Check that every expectation was consumed and no invocation failed.
    ///
    /// Failures raised by [`Executor::execute`] are reported here too, so a
    /// build step that swallowed the error still fails the scenario.
    ///
    /// # Errors
    ///
    /// Returns the first recorded [`ExecError`], otherwise
    /// [`MockError::Unsatisfied`] when the queue is not empty.
    pub fn verify(&self) -> Result<(), MockError> {
        let state = self.state();
        if let Some(first) = state.failures.first() {
            return Err(clone_mock_error(first).into());
        }
        if state.queue.is_empty() {
            Ok(())
        } else {
            Err(MockError::Unsatisfied {
                remaining: state
                    .queue
                    .iter()
                    .map(|p| p.pattern().to_string())
                    .collect(),
            })
        }
    }
}

impl Executor for ProcessMocker {
    fn execute(&self, invocation: &Invocation) -> Result<ExecOutput, ExecError> {
        let command = invocation.command_line();
        let mut state = self.state();
        let result = match state.queue.pop_front() {
            None => Err(ExecError::UnexpectedInvocation { command }),
            Some(pattern) if pattern.matches(invocation) => {
                debug!("mock matched /{}/ for `{command}`", pattern.pattern());
                state.log.push(invocation.clone());
                Ok(pattern.output())
            }
            Some(pattern) => Err(ExecError::WrongCommand {
                expected: pattern.pattern().to_string(),
                actual: command,
            }),
        };
        if let Err(err) = &result {
            state.failures.push(clone_mock_error(err));
        }
        result
    }
}

// `ExecError` holds an `io::Error` and so is not `Clone`; the mock never
// produces the spawn or i/o variants.
fn clone_mock_error(err: &ExecError) -> ExecError {
    match err {
        ExecError::UnexpectedInvocation { command } => ExecError::UnexpectedInvocation {
            command: command.clone(),
        },
        ExecError::WrongCommand { expected, actual } => ExecError::WrongCommand {
            expected: expected.clone(),
            actual: actual.clone(),
        },
        ExecError::Spawn { command, source } => ExecError::Spawn {
            command: command.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        },
        ExecError::Io { command, source } => ExecError::Io {
            command: command.clone(),
            source: std::io::Error::new(source.kind(), source.to_string()),
        },
    }
}
