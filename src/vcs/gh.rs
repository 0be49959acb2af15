//! GitHub CLI backend for draft releases and change labels

use crate::vcs::{run_command, stdout_or_error, LabelOutcome, RemoteError};
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

/// Wrapper around the `gh` binary
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
    repo_path: PathBuf,
}

impl GhCli {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            program: "gh".to_string(),
            repo_path: repo_path.into(),
        }
    }

    /// Use a different executable (e.g. a wrapper script)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run(&self, args: &[&str]) -> Result<String, RemoteError> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        debug!("Running {}", command_line);
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.repo_path).args(args);
        let output = run_command(&mut cmd, &command_line).await?;
        stdout_or_error(output, &command_line)
    }

    /// Create a draft release for a tag that already exists on the remote
    pub async fn create_draft_release(&self, tag: &str, title: &str) -> Result<String, RemoteError> {
        let result = self
            .run(&[
                "release",
                "create",
                tag,
                "--draft",
                "--verify-tag",
                "--generate-notes",
                "--title",
                title,
            ])
            .await;

        match result {
            Ok(url) => {
                info!("Created draft release {}", url);
                Ok(url)
            }
            Err(RemoteError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                Err(RemoteError::ReleaseExists { tag: tag.to_string() })
            }
            Err(e) => Err(e),
        }
    }

    /// Labels currently on a pull request
    pub async fn labels(&self, change: u64) -> Result<Vec<String>, RemoteError> {
        let number = change.to_string();
        let output = self
            .run(&["pr", "view", &number, "--json", "labels", "--jq", ".labels[].name"])
            .await?;
        Ok(parse_labels(&output))
    }

    /// Add a label unless the pull request already carries it
    pub async fn add_label(&self, change: u64, label: &str) -> Result<LabelOutcome, RemoteError> {
        if self.labels(change).await?.iter().any(|l| l == label) {
            debug!("Change #{} already labelled '{}'", change, label);
            return Ok(LabelOutcome::AlreadyPresent);
        }

        let number = change.to_string();
        self.run(&["pr", "edit", &number, "--add-label", label]).await?;
        info!("Labelled change #{} with '{}'", change, label);
        Ok(LabelOutcome::Added)
    }
}

fn parse_labels(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}
