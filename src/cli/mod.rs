//! Command-line interface for music-importer.
//!
//! `import` runs the release import pipeline over one or more directories;
//! `check-format` and `read-tags` help get a config right before importing.

mod commands;

pub use commands::{Cli, Commands, ImportArgs, run_command};
