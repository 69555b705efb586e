//! Configuration loading helpers.
//!
//! Layers `build` arguments over configuration files and environment
//! variables, then resolves them into a [`BuildContext`].

use ortho_config::load_and_merge_subcommand_for;

use crate::cli_args::BuildArgs;
use crate::policy::UnbundlingPolicy;
use crate::step::{BuildContext, StepError, runtime_version_from_env};

/// Merge `cli` with configuration files and `RUBYSTEPCMDS_BUILD_*`
/// environment variables.
///
/// # Errors
///
/// Returns [`StepError::Config`] if configuration gathering fails.
pub fn load_build_args(cli: &BuildArgs) -> Result<BuildArgs, StepError> {
    load_and_merge_subcommand_for::<BuildArgs>(cli).map_err(|e| StepError::Config(Box::new(e)))
}

/// Resolve merged arguments into a [`BuildContext`].
///
/// An explicit `runtime_version` wins over
/// [`RUNTIME_VERSION_ENV`](crate::step::RUNTIME_VERSION_ENV); a
/// configured policy file replaces the built-in table.
///
/// # Errors
///
/// Returns [`StepError::Policy`] when the policy file cannot be loaded.
pub fn build_context(args: &BuildArgs) -> Result<BuildContext, StepError> {
    let mut ctx = BuildContext::default();
    ctx.runtime_version = args
        .runtime_version
        .clone()
        .or_else(runtime_version_from_env);
    if let Some(gem_command) = &args.gem_command {
        ctx.gem_command.clone_from(gem_command);
    }
    if let Some(path) = &args.policy_file {
        ctx.policy = UnbundlingPolicy::load(path)?;
    }
    Ok(ctx)
}
