//! System git backend - history inspection and tag publication

use crate::release::tags::{ReachableTag, TagError};
use crate::vcs::{run_command, stdout_or_error, RemoteError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Outcome of `git push --porcelain` for one ref
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushStatus {
    /// Ref was created on the remote
    Created,
    /// Ref already existed (rejected, or already pointing at the same object)
    AlreadyExists,
    /// Ref was rejected for another reason
    Rejected(String),
    /// No status line for the ref
    Missing,
}

/// Git backend calling the system `git` binary
#[derive(Debug, Clone)]
pub struct SystemGit {
    repo_path: PathBuf,
    remote: String,
}

impl SystemGit {
    pub fn new(repo_path: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: remote.into(),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Git command rooted at the repository with user config overrides
    fn git_cmd(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo_path);
        cmd.arg("-c").arg("advice.detachedHead=false");
        cmd.arg("-c").arg("core.quotePath=false");
        cmd
    }

    async fn run(&self, args: &[&str]) -> Result<String, RemoteError> {
        let command_line = format!("git {}", args.join(" "));
        debug!("Running {}", command_line);
        let output = run_command(self.git_cmd().args(args), &command_line).await?;
        stdout_or_error(output, &command_line)
    }

    /// Get HEAD commit SHA
    pub async fn head_commit(&self) -> Result<String, RemoteError> {
        self.run(&["rev-parse", "HEAD"]).await
    }

    /// Full name of the checked out ref, or `HEAD` when detached
    pub async fn current_ref(&self) -> Result<String, RemoteError> {
        self.run(&["rev-parse", "--symbolic-full-name", "HEAD"]).await
    }

    /// Whether the checkout lacks full history
    pub async fn is_shallow(&self) -> Result<bool, RemoteError> {
        let output = self.run(&["rev-parse", "--is-shallow-repository"]).await?;
        Ok(output == "true")
    }

    /// Every tag reachable from HEAD with its commit distance
    ///
    /// Refuses shallow checkouts: they hide tags and would yield an arbitrary
    /// answer.
    pub async fn reachable_tags(&self) -> Result<Vec<ReachableTag>, TagError> {
        let history = |e: RemoteError| TagError::History(e.to_string());

        if self.is_shallow().await.map_err(history)? {
            return Err(TagError::ShallowHistory);
        }

        let refs = self
            .run(&[
                "for-each-ref",
                "--merged",
                "HEAD",
                "--format=%(refname:strip=2)%09%(creatordate:unix)%09%(objectname)%09%(*objectname)",
                "refs/tags",
            ])
            .await
            .map_err(history)?;

        let mut tags = Vec::new();
        for (name, created_at, commit) in parse_tag_refs(&refs) {
            let range = format!("{}..HEAD", commit);
            let count = self
                .run(&["rev-list", "--count", &range])
                .await
                .map_err(history)?;
            let distance = count
                .parse::<usize>()
                .map_err(|e| TagError::History(format!("bad commit count '{}': {}", count, e)))?;

            let mut tag = ReachableTag::new(name, distance);
            tag.created_at = created_at;
            tags.push(tag);
        }

        debug!("Found {} reachable tag(s)", tags.len());
        Ok(tags)
    }

    /// Create a lightweight tag locally and push it, failing if it exists
    pub async fn push_tag(&self, tag: &str, commit: &str) -> Result<(), RemoteError> {
        match self.run(&["tag", tag, commit]).await {
            Err(RemoteError::CommandFailed { stderr, .. }) if stderr.contains("already exists") => {
                return Err(RemoteError::TagExists { tag: tag.to_string() });
            }
            Err(e) => return Err(e),
            Ok(_) => {}
        }

        let dst = format!("refs/tags/{}", tag);
        let refspec = format!("{0}:{0}", dst);
        let command_line = format!("git push --porcelain {} {}", self.remote, refspec);
        let output = run_command(
            self.git_cmd()
                .args(["push", "--porcelain"])
                .arg(&self.remote)
                .arg(&refspec),
            &command_line,
        )
        .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        match parse_push_porcelain(&stdout, &dst) {
            PushStatus::Created => {
                info!("Pushed tag {} to {}", tag, self.remote);
                Ok(())
            }
            PushStatus::AlreadyExists => {
                warn!("Tag {} already exists on {}", tag, self.remote);
                self.drop_local_tag(tag).await;
                Err(RemoteError::TagExists { tag: tag.to_string() })
            }
            PushStatus::Rejected(summary) => {
                self.drop_local_tag(tag).await;
                Err(RemoteError::CommandFailed {
                    command: command_line,
                    stderr: summary,
                })
            }
            PushStatus::Missing => {
                self.drop_local_tag(tag).await;
                Err(RemoteError::CommandFailed {
                    command: command_line,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        }
    }

    async fn drop_local_tag(&self, tag: &str) {
        if let Err(e) = self.run(&["tag", "-d", tag]).await {
            debug!("Could not delete local tag {}: {}", tag, e);
        }
    }
}

/// Parse `for-each-ref` lines into (name, created_at, commit)
///
/// Annotated tags are peeled to the commit they point at.
fn parse_tag_refs(output: &str) -> Vec<(String, Option<i64>, String)> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split('\t');
            let name = fields.next()?.trim();
            let created_at = fields.next().and_then(|s| s.trim().parse::<i64>().ok());
            let object = fields.next().unwrap_or_default().trim();
            let peeled = fields.next().unwrap_or_default().trim();
            let commit = if peeled.is_empty() { object } else { peeled };

            if name.is_empty() || commit.is_empty() {
                return None;
            }
            Some((name.to_string(), created_at, commit.to_string()))
        })
        .collect()
}

/// Find the status of `dst_ref` in `git push --porcelain` output
fn parse_push_porcelain(output: &str, dst_ref: &str) -> PushStatus {
    for line in output.lines() {
        let mut fields = line.split('\t');
        let (Some(flag), Some(refs)) = (fields.next(), fields.next()) else {
            continue;
        };
        if !refs.ends_with(&format!(":{}", dst_ref)) {
            continue;
        }
        let summary = fields.next().unwrap_or_default().to_string();

        return match flag.trim() {
            "*" => PushStatus::Created,
            "=" => PushStatus::AlreadyExists,
            "!" if summary.contains("[rejected]") || summary.contains("already exists") => {
                PushStatus::AlreadyExists
            }
            "!" => PushStatus::Rejected(summary),
            _ => PushStatus::Rejected(summary),
        };
    }

    PushStatus::Missing
}
