//! CLI command definitions

use crate::core::{config::ReleaseConfig, TriggerEvent};
use crate::execution::SchedulingStrategy;
use crate::release::ReleasePolicy;
use clap::Args;
use std::path::PathBuf;

/// Release gate overrides shared by `decide` and `run`
#[derive(Debug, Args, Clone)]
pub struct ReleaseArgs {
    /// Repository checkout (must have full history)
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Manifest declaring the version, relative to the repository
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Dotted key path of the version in the manifest
    #[arg(long)]
    pub version_key: Option<String>,

    /// Prefix of release tags
    #[arg(long)]
    pub tag_prefix: Option<String>,

    /// Regex restricting which tags count as release tags
    #[arg(long)]
    pub tag_pattern: Option<String>,

    /// How the expected and detected tags are compared
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Remote release tags are pushed to
    #[arg(long)]
    pub remote: Option<String>,
}

impl ReleaseArgs {
    /// Apply command-line overrides on top of the configured settings
    pub fn apply(&self, release: &mut ReleaseConfig) {
        if let Some(manifest) = &self.manifest {
            release.manifest = manifest.clone();
        }
        if let Some(key) = &self.version_key {
            release.version_key = key.clone();
        }
        if let Some(prefix) = &self.tag_prefix {
            release.tag_prefix = prefix.clone();
        }
        if let Some(pattern) = &self.tag_pattern {
            release.tag_pattern = Some(pattern.clone());
        }
        if let Some(policy) = self.policy {
            release.policy = policy.into();
        }
        if let Some(remote) = &self.remote {
            release.remote = remote.clone();
        }
    }
}

/// Compute the release decision
#[derive(Debug, Args, Clone)]
pub struct DecideCommand {
    /// Pipeline YAML file to take release settings from
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Append the outputs as key=value lines to this file (e.g. $GITHUB_OUTPUT)
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// What triggered the run
#[derive(Debug, Args, Clone)]
pub struct TriggerArgs {
    /// Triggering event
    #[arg(long, value_enum, default_value_t = EventArg::Push)]
    pub event: EventArg,

    /// Git ref of the run (defaults to the checked out ref)
    #[arg(long)]
    pub git_ref: Option<String>,

    /// Commit to release (defaults to HEAD)
    #[arg(long)]
    pub commit: Option<String>,

    /// Pending change (pull request) number
    #[arg(long)]
    pub change: Option<u64>,
}

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    #[command(flatten)]
    pub release: ReleaseArgs,

    #[command(flatten)]
    pub trigger: TriggerArgs,

    /// Scheduling strategy
    #[arg(long, value_enum, default_value_t = SchedulingStrategyArg::Sequential)]
    pub strategy: SchedulingStrategyArg,

    /// Maximum concurrent stages with `parallel-limited`
    #[arg(long, default_value_t = 4)]
    pub max_parallel: usize,

    /// Publish and annotate against an in-memory remote instead of the real one
    #[arg(long)]
    pub dry_run: bool,

    /// Append the decision outputs to this file
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventArg {
    Push,
    PullRequest,
}

impl From<EventArg> for TriggerEvent {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => TriggerEvent::Push,
            EventArg::PullRequest => TriggerEvent::PullRequest,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyArg {
    TagMismatch,
    SemverGreater,
}

impl From<PolicyArg> for ReleasePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::TagMismatch => ReleasePolicy::TagMismatch,
            PolicyArg::SemverGreater => ReleasePolicy::SemverGreater,
        }
    }
}

/// Scheduling strategy argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulingStrategyArg {
    Sequential,
    Parallel,
    #[clap(name = "parallel-limited")]
    ParallelLimited,
}

impl SchedulingStrategyArg {
    pub fn into_strategy(self, max_parallel: usize) -> SchedulingStrategy {
        match self {
            SchedulingStrategyArg::Sequential => SchedulingStrategy::Sequential,
            SchedulingStrategyArg::Parallel => SchedulingStrategy::Parallel,
            SchedulingStrategyArg::ParallelLimited => SchedulingStrategy::LimitedParallel(max_parallel),
        }
    }
}
