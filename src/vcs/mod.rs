//! Remote repository boundary
//!
//! The remote is the only state shared between concurrent runs. Tag creation
//! goes through [`RemoteRepository::push_tag`], which must behave as a
//! compare-and-set: an existing tag is reported as [`RemoteError::TagExists`],
//! never overwritten.

pub mod gh;
pub mod memory;
pub mod system_git;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Output;
use thiserror::Error;
use tokio::process::Command;

pub use gh::GhCli;
pub use memory::{DraftRelease, InMemoryRemote};
pub use system_git::SystemGit;

/// Errors from remote operations
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Tag {tag} already exists")]
    TagExists { tag: String },

    #[error("A release for {tag} already exists")]
    ReleaseExists { tag: String },

    #[error("Failed to run `{command}`: {reason}")]
    Spawn { command: String, reason: String },

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
}

/// Result of labelling a pending change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelOutcome {
    Added,
    AlreadyPresent,
}

/// Operations against the shared remote
#[async_trait]
pub trait RemoteRepository: Send + Sync {
    /// Create `tag` at `commit` and publish it; fails with `TagExists` when the
    /// tag is already there
    async fn push_tag(&self, tag: &str, commit: &str) -> Result<(), RemoteError>;

    /// Create a draft release for an existing tag; returns the release ID
    async fn create_draft_release(&self, tag: &str, title: &str) -> Result<String, RemoteError>;

    /// Attach `label` to pending change `change`; idempotent
    async fn add_label(&self, change: u64, label: &str) -> Result<LabelOutcome, RemoteError>;
}

/// GitHub-hosted remote: tags through git, releases and labels through `gh`
pub struct GitHubRemote {
    git: SystemGit,
    gh: GhCli,
}

impl GitHubRemote {
    pub fn new(git: SystemGit, gh: GhCli) -> Self {
        Self { git, gh }
    }
}

#[async_trait]
impl RemoteRepository for GitHubRemote {
    async fn push_tag(&self, tag: &str, commit: &str) -> Result<(), RemoteError> {
        self.git.push_tag(tag, commit).await
    }

    async fn create_draft_release(&self, tag: &str, title: &str) -> Result<String, RemoteError> {
        self.gh.create_draft_release(tag, title).await
    }

    async fn add_label(&self, change: u64, label: &str) -> Result<LabelOutcome, RemoteError> {
        self.gh.add_label(change, label).await
    }
}

/// Spawn a command and wait for its output
pub(crate) async fn run_command(cmd: &mut Command, command_line: &str) -> Result<Output, RemoteError> {
    cmd.kill_on_drop(true)
        .output()
        .await
        .map_err(|e| RemoteError::Spawn {
            command: command_line.to_string(),
            reason: e.to_string(),
        })
}

/// Stdout of a successful command, or `CommandFailed` with its stderr
pub(crate) fn stdout_or_error(output: Output, command_line: &str) -> Result<String, RemoteError> {
    if !output.status.success() {
        return Err(RemoteError::CommandFailed {
            command: command_line.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
