//! In-memory remote for dry runs and tests

use crate::vcs::{LabelOutcome, RemoteError, RemoteRepository};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;
use tokio::sync::Mutex;

/// A draft release held by [`InMemoryRemote`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRelease {
    pub id: String,
    pub tag: String,
    pub title: String,
}

#[derive(Debug, Default)]
struct RemoteState {
    /// tag -> commit
    tags: BTreeMap<String, String>,
    releases: Vec<DraftRelease>,
    labels: HashMap<u64, BTreeSet<String>>,
    fail_releases: bool,
    release_latency: Option<Duration>,
}

/// Remote whose state lives in process memory
///
/// All operations serialize on one lock, so tag creation is an atomic
/// compare-and-set across every task sharing the instance.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote that already carries these tags
    pub fn with_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let state = RemoteState {
            tags: tags.into_iter().map(|(t, c)| (t.into(), c.into())).collect(),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Make every release creation fail
    pub async fn fail_releases(&self) {
        self.state.lock().await.fail_releases = true;
    }

    /// Make release creation take this long, outside the lock
    pub async fn delay_releases(&self, latency: Duration) {
        self.state.lock().await.release_latency = Some(latency);
    }

    pub async fn tags(&self) -> BTreeMap<String, String> {
        self.state.lock().await.tags.clone()
    }

    pub async fn releases(&self) -> Vec<DraftRelease> {
        self.state.lock().await.releases.clone()
    }

    pub async fn labels(&self, change: u64) -> BTreeSet<String> {
        self.state
            .lock()
            .await
            .labels
            .get(&change)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RemoteRepository for InMemoryRemote {
    async fn push_tag(&self, tag: &str, commit: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().await;
        if state.tags.contains_key(tag) {
            return Err(RemoteError::TagExists { tag: tag.to_string() });
        }
        state.tags.insert(tag.to_string(), commit.to_string());
        Ok(())
    }

    async fn create_draft_release(&self, tag: &str, title: &str) -> Result<String, RemoteError> {
        let latency = self.state.lock().await.release_latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock().await;
        if state.fail_releases {
            return Err(RemoteError::CommandFailed {
                command: format!("create release {}", tag),
                stderr: "release service unavailable".to_string(),
            });
        }
        if !state.tags.contains_key(tag) {
            return Err(RemoteError::CommandFailed {
                command: format!("create release {}", tag),
                stderr: format!("tag {} not found", tag),
            });
        }
        if state.releases.iter().any(|r| r.tag == tag) {
            return Err(RemoteError::ReleaseExists { tag: tag.to_string() });
        }

        let id = format!("draft-{}", state.releases.len() + 1);
        state.releases.push(DraftRelease {
            id: id.clone(),
            tag: tag.to_string(),
            title: title.to_string(),
        });
        Ok(id)
    }

    async fn add_label(&self, change: u64, label: &str) -> Result<LabelOutcome, RemoteError> {
        let mut state = self.state.lock().await;
        let inserted = state
            .labels
            .entry(change)
            .or_default()
            .insert(label.to_string());
        Ok(if inserted {
            LabelOutcome::Added
        } else {
            LabelOutcome::AlreadyPresent
        })
    }
}
