//! Entry point for the `rubystep` binary.

use anyhow::Context as _;
use clap::Parser;
use log::info;

use rubystep::config::{build_context, load_build_args};
use rubystep::{Cli, Commands, SystemExecutor, step};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Build(args) => {
            let args = load_build_args(&args).context("loading build configuration")?;
            let ctx = build_context(&args)?;
            let report = step::build_with(&ctx, &SystemExecutor)?;
            info!(
                "build step finished for Ruby {}: {} gem(s) installed",
                report.runtime_version,
                report.installed.len()
            );
            for gem in &report.installed {
                println!("{gem}");
            }
        }
    }
    Ok(())
}
