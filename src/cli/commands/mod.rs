//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `import`: match release directories and move them into the library
//! - `tags`: template checking and tag inspection

mod import;
mod tags;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, Config};
use crate::importer::ImportCondition;

pub use import::cmd_import;
pub use tags::{cmd_check_format, cmd_read_tags};

/// Music Importer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (default: the OS config dir)
    #[arg(short, long, global = true, env = "MUSIC_IMPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Match release directories against MusicBrainz and import them
    Import(ImportArgs),
    /// Validate a path template and print its root directory
    CheckFormat {
        /// Template text, e.g. "/music/{{ release.title }}/{{ track_num }}{{ ext }}"
        template: String,
    },
    /// Print the normalized tags and audio properties of files
    ReadTags {
        /// Audio files to read
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Flags for `import`; each overrides the config file
#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Release directories, one release each
    #[arg(required = true)]
    pub dirs: Vec<PathBuf>,

    /// Copy files instead of moving them
    #[arg(long)]
    pub copy: bool,

    /// Dry run - show what would be done without touching any files
    #[arg(long)]
    pub dry_run: bool,

    /// Import regardless of the match score
    #[arg(short, long)]
    pub yes: bool,

    /// Use this MusicBrainz release ID instead of searching
    #[arg(long)]
    pub mbid: Option<String>,

    /// When to import a match
    #[arg(long, value_enum)]
    pub condition: Option<ImportCondition>,

    /// Imports to run at once
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Library path template
    #[arg(long, env = "MUSIC_IMPORTER_PATH_FORMAT")]
    pub path_format: Option<String>,
}

impl ImportArgs {
    /// Fold the flags into the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(path_format) = &self.path_format {
            config.path_format = path_format.clone();
        }
        if let Some(condition) = self.condition {
            config.import.condition = condition;
        }
        if self.yes {
            config.import.condition = ImportCondition::Confirm;
        }
        if let Some(jobs) = self.jobs {
            config.import.jobs = jobs;
        }
        config.import.copy |= self.copy;
        config.import.dry_run |= self.dry_run;
    }
}

/// Run the parsed CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Import(args) => {
            let mut config = match &cli.config {
                Some(path) => config::load_from(path),
                None => config::load(),
            };
            args.apply(&mut config);

            let rt = Runtime::new()?;
            cmd_import(&rt, &config, &args.dirs, args.mbid.as_deref())
        }
        Commands::CheckFormat { template } => cmd_check_format(template),
        Commands::ReadTags { files } => cmd_read_tags(files),
    }
}
