//! Scenario runner for build-step tests.
//!
//! A [`Scenario`] pairs the environment a build step reads with the commands
//! it is expected to run. [`run`] scopes the environment, swaps in a fresh
//! [`ProcessMocker`] as the execution backend, runs the build function and
//! checks the mock was drained in order.
//!
//! ```
//! use rubystep::harness::{self, Scenario};
//! use rubystep::mockprocess::CommandPattern;
//! use rubystep::step::{self, RUNTIME_VERSION_ENV};
//!
//! let scenario = Scenario::new("ruby 3.3.0 installs nothing")
//!     .with_env(RUNTIME_VERSION_ENV, "3.3.0")
//!     .with_exec_mock(Vec::<CommandPattern>::new());
//! harness::run(&scenario, step::build).expect("scenario passes");
//! ```

use std::fmt;

use log::debug;
use thiserror::Error;

use crate::environment::{self, EnvGuard};
use crate::exec::Executor;
use crate::mockprocess::{CommandPattern, MockError, ProcessMocker};
use crate::step::StepError;

/// The step of a scenario that failed.
#[derive(Debug, Error)]
pub enum HarnessFailure {
    #[error("build failed: {0}")]
    Build(#[source] StepError),
    #[error("command expectations not met: {0}")]
    Verify(#[source] MockError),
}

/// A failed scenario, tagged with its name.
#[derive(Debug, Error)]
#[error("scenario '{scenario}': {failure}")]
pub struct ScenarioError {
    pub scenario: String,
    #[source]
    pub failure: HarnessFailure,
}

/// One self-contained test case.
#[derive(Clone)]
pub struct Scenario {
    name: String,
    env: Vec<(String, Option<String>)>,
    expected: Vec<CommandPattern>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            env: Vec::new(),
            expected: Vec::new(),
        }
    }

    /// Set `key` for the duration of the scenario.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), Some(value.into())));
        self
    }

    /// Unset `key` for the duration of the scenario.
    #[must_use]
    pub fn without_env(mut self, key: impl Into<String>) -> Self {
        self.env.push((key.into(), None));
        self
    }

    /// Expect exactly these commands, in this order.
    #[must_use]
    pub fn with_exec_mock(mut self, patterns: impl IntoIterator<Item = CommandPattern>) -> Self {
        self.expected.extend(patterns);
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("env", &self.env)
            .field("expected", &self.expected.len())
            .finish()
    }
}

/// Run `build_fn` under `scenario`.
///
/// Scenarios are serialised process-wide while their environment is applied;
/// the previous environment is restored before returning, including when
/// `build_fn` panics.
///
/// # Errors
///
/// Returns [`ScenarioError`] carrying the build failure if the build function
/// fails, otherwise the verification failure if the expected commands were
/// not all run in order.
pub fn run<T, F>(scenario: &Scenario, build_fn: F) -> Result<(), ScenarioError>
where
    F: FnOnce(&dyn Executor) -> Result<T, StepError>,
{
    let _serial = environment::scenario_lock();
    let _env = EnvGuard::apply(
        scenario
            .env
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_deref())),
    );
    let mocker = ProcessMocker::with_expectations(scenario.expected.iter().cloned());
    debug!(
        "running scenario '{}' with {} expected command(s)",
        scenario.name,
        scenario.expected.len()
    );

    let fail = |failure| ScenarioError {
        scenario: scenario.name.clone(),
        failure,
    };
    let executor: &dyn Executor = &mocker;
    build_fn(executor).map_err(|e| fail(HarnessFailure::Build(e)))?;
    mocker
        .verify()
        .map_err(|e| fail(HarnessFailure::Verify(e)))
}

/// Like [`run`], panicking with the scenario diagnostic on failure.
///
/// # Panics
///
/// Panics when the scenario fails.
pub fn assert_build<T, F>(scenario: &Scenario, build_fn: F)
where
    F: FnOnce(&dyn Executor) -> Result<T, StepError>,
{
    if let Err(err) = run(scenario, build_fn) {
        panic!("{err}");
    }
}
