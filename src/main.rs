//! Music Importer command-line entry point.

use clap::Parser;
use music_importer::cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging; stdout is left for command output
    let default_level = if args.verbose {
        "music_importer=debug"
    } else {
        "music_importer=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(default_level.parse()?))
        .init();

    cli::run_command(&args)
}
