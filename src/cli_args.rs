//! Command-line argument structures.
//!
//! Isolates clap derivations so lint expectations remain scoped, keeping
//! `main.rs` focused on runtime logic.

use clap::{Parser, Subcommand};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "rubystep",
    about = "Install gems that the detected Ruby runtime no longer bundles"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the build step
    Build(BuildArgs),
}

/// Parameters accepted by the `build` sub-command.
///
/// Every field is optional so configuration files and `RUBYSTEPCMDS_BUILD_*`
/// environment variables can fill the gaps the command line leaves. Unset
/// fields are skipped when serialised so they never mask a lower layer.
#[derive(Parser, Deserialize, Serialize, Default, Debug, OrthoConfig, Clone)]
#[command(name = "build")]
#[ortho_config(prefix = "RUBYSTEP")]
pub struct BuildArgs {
    /// Program used to install gems (default: `gem`)
    #[arg(long, value_name = "CMD")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gem_command: Option<String>,
    /// JSON policy table replacing the built-in one
    #[arg(long, value_name = "PATH")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,
    /// Runtime version to plan for, overriding `GOOGLE_RUNTIME_VERSION`
    #[arg(long, value_name = "VERSION")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,
}
