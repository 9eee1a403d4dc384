use std::io::{self, Read};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use git_patch::dispatcher::MEMORY_LIMIT_ENV;
use git_patch::{protocol, write_patch_file, ActionPrinter, PatchSettings};
use git_submodule::LocalFetcher;
use tracing::debug;

use crate::Cli;

#[derive(Args)]
pub struct BuildArgs {}

pub fn run(_args: &BuildArgs, cli: &Cli) -> Result<i32> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("cannot read patch properties from stdin")?;
    let props = protocol::decode(&input)?;
    let settings = PatchSettings::from_properties(&props)?;
    crate::init_logging(settings.debug || cli.verbose);

    if let Ok(limit) = std::env::var(MEMORY_LIMIT_ENV) {
        debug!(limit_mb = %limit, "memory limit");
    }

    let stdout = io::stdout();
    let mut printer = ActionPrinter::new(stdout.lock());
    write_patch_file(&settings, Arc::new(LocalFetcher::new()), &mut printer)
        .with_context(|| format!("cannot build patch for {}", settings.root.url))?;
    Ok(0)
}
