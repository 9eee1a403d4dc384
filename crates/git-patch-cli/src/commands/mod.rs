pub mod build;
pub mod diff;

use anyhow::Result;
use clap::Subcommand;

use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Build a patch described by a property map read from stdin (child process mode)
    Build(build::BuildArgs),
    /// Print the patch between two commits of a repository
    Diff(diff::DiffArgs),
}

pub fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Commands::Build(args) => build::run(args, &cli),
        Commands::Diff(args) => diff::run(args, &cli),
    }
}
