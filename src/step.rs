//! The Ruby build step.
//!
//! Resolves the detected runtime version, asks the [`UnbundlingPolicy`] which
//! gems the runtime no longer ships, and installs them one at a time through
//! an [`Executor`].

use std::env::VarError;

use log::{debug, info};
use thiserror::Error;

use crate::environment;
use crate::exec::{ExecError, Executor};
use crate::policy::{PolicyError, UnbundlingPolicy, install_invocation};
use crate::version::{RuntimeVersion, VersionError};

/// Environment variable carrying the detected runtime version.
pub const RUNTIME_VERSION_ENV: &str = "GOOGLE_RUNTIME_VERSION";

/// Program used to install gems unless configured otherwise.
pub const DEFAULT_GEM_COMMAND: &str = "gem";

/// Read [`RUNTIME_VERSION_ENV`].
///
/// A non-Unicode value is kept (lossily) so it fails version parsing rather
/// than reading as unset.
pub(crate) fn runtime_version_from_env() -> Option<String> {
    match environment::var(RUNTIME_VERSION_ENV) {
        Ok(value) => Some(value),
        Err(VarError::NotPresent) => None,
        Err(VarError::NotUnicode(raw)) => Some(raw.to_string_lossy().into_owned()),
    }
}

/// Errors that fail the build step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("runtime version not detected: {key} is not set")]
    VersionNotDetected { key: &'static str },
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("`{command}` exited with status {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },
    #[error("configuration error: {0}")]
    Config(Box<ortho_config::OrthoError>),
}

/// Explicit inputs to the build step.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub runtime_version: Option<String>,
    pub gem_command: String,
    pub policy: UnbundlingPolicy,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            runtime_version: None,
            gem_command: DEFAULT_GEM_COMMAND.to_string(),
            policy: UnbundlingPolicy::builtin(),
        }
    }
}

impl BuildContext {
    /// Context with the runtime version read from [`RUNTIME_VERSION_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            runtime_version: runtime_version_from_env(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_runtime_version(mut self, version: impl Into<String>) -> Self {
        self.runtime_version = Some(version.into());
        self
    }

    #[must_use]
    pub fn with_gem_command(mut self, gem_command: impl Into<String>) -> Self {
        self.gem_command = gem_command.into();
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: UnbundlingPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// What the build step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub runtime_version: RuntimeVersion,
    pub installed: Vec<String>,
}

/// Run the build step with configuration taken from the environment.
///
/// # Errors
///
/// See [`build_with`].
pub fn build(executor: &dyn Executor) -> Result<BuildReport, StepError> {
    build_with(&BuildContext::from_env(), executor)
}

/// Run the build step with explicit configuration.
///
/// Installs stop at the first failure; a partially installed gem set is
/// reported as an error rather than retried.
///
/// # Errors
///
/// Returns [`StepError::VersionNotDetected`] when no version is configured,
/// [`StepError::Version`] when it is malformed, [`StepError::Exec`] when a
/// command cannot be run and [`StepError::CommandFailed`] when one exits
/// non-zero.
pub fn build_with(ctx: &BuildContext, executor: &dyn Executor) -> Result<BuildReport, StepError> {
    let raw = ctx
        .runtime_version
        .as_deref()
        .ok_or(StepError::VersionNotDetected {
            key: RUNTIME_VERSION_ENV,
        })?;
    let version = RuntimeVersion::parse(raw)?;
    let plan = ctx.policy.plan(&version);
    if plan.is_empty() {
        info!("Ruby {version} bundles its default gems; nothing to install");
    } else {
        info!(
            "Ruby {version} no longer bundles {} gem(s); installing them",
            plan.len()
        );
    }

    let mut installed = Vec::with_capacity(plan.len());
    for gem in plan.gems() {
        let invocation = install_invocation(&ctx.gem_command, gem);
        let output = executor.execute(&invocation)?;
        if !output.success() {
            return Err(StepError::CommandFailed {
                command: invocation.command_line(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        debug!("installed {gem}");
        installed.push(gem.clone());
    }

    Ok(BuildReport {
        runtime_version: version,
        installed,
    })
}
