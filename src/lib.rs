//! Ruby build step that installs gems the detected runtime no longer bundles.
//!
//! External commands run through the [`exec::Executor`] seam. Tests replace
//! it with [`mockprocess::ProcessMocker`] and drive whole scenarios through
//! [`harness`].

pub mod cli_args;
pub mod config;
pub mod environment;
pub mod exec;
pub mod harness;
pub mod mockprocess;
pub mod policy;
pub mod step;
pub mod version;

pub use cli_args::{BuildArgs, Cli, Commands};
pub use exec::{ExecError, ExecOutput, Executor, Invocation, SystemExecutor};
pub use policy::{InstallPlan, UnbundlingPolicy};
pub use step::{BuildContext, BuildReport, StepError};
pub use version::RuntimeVersion;
