#![doc = include_str!("../README.md")]

mod cli;
mod commands;
mod types;

pub(crate) use cli::Cli;
pub(crate) use types::OutputFormat;

use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> miette::Result<()> {
    // Diagnostics end up in campaign logs that get grepped; keep them on one line.
    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().wrap_lines(false).build())
    }))
    .ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    commands::run::run_campaign_command(cli)
}
