//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{DecideCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;

/// A stage failed, or the run budget was exceeded
pub const EXIT_STAGE_FAILURE: u8 = 1;
/// No decision could be made (manifest, history or configuration)
pub const EXIT_DECISION_ERROR: u8 = 2;
/// The release tag was already published by another run
pub const EXIT_TAG_CONFLICT: u8 = 3;

/// Release gate and stage pipeline
#[derive(Debug, Parser, Clone)]
#[command(name = "release-pipeline")]
#[command(version)]
#[command(about = "Decide whether a commit releases, then run the release pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Compute the release decision and print its outputs
    Decide(DecideCommand),

    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
