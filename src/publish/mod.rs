//! Release publication: tag push followed by a draft release

use crate::core::state::FailureKind;
use crate::release::ReleaseDecision;
use crate::vcs::{RemoteError, RemoteRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Final state of a publication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationState {
    /// Tag pushed and draft release created
    Draft,
    /// Tag already existed; nothing was created
    Conflict,
    /// Tag pushed but the release could not be created
    Failed,
}

/// Outcome of one publication attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub tag: String,
    pub release_id: Option<String>,
    pub state: PublicationState,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Decision does not call for a release of {tag}")]
    NotReleasable { tag: String },

    #[error("Tag {tag} already exists on the remote (publication race, not a build defect)")]
    TagConflict { tag: String },

    #[error("Failed to push tag {tag}: {source}")]
    TagPush {
        tag: String,
        #[source]
        source: RemoteError,
    },

    #[error("Tag {tag} was pushed but the draft release failed: {source}")]
    ReleaseCreation {
        tag: String,
        #[source]
        source: RemoteError,
    },
}

impl PublishError {
    /// How the publish stage failure is reported
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            PublishError::TagConflict { .. } => FailureKind::TagConflict,
            PublishError::ReleaseCreation { .. } => FailureKind::ReleaseCreationFailure,
            PublishError::NotReleasable { .. } | PublishError::TagPush { .. } => {
                FailureKind::StageFailure
            }
        }
    }

    /// Publication record for attempts that reached the remote
    pub fn record(&self) -> Option<PublicationRecord> {
        match self {
            PublishError::TagConflict { tag } => Some(PublicationRecord {
                tag: tag.clone(),
                release_id: None,
                state: PublicationState::Conflict,
            }),
            PublishError::ReleaseCreation { tag, .. } => Some(PublicationRecord {
                tag: tag.clone(),
                release_id: None,
                state: PublicationState::Failed,
            }),
            PublishError::NotReleasable { .. } | PublishError::TagPush { .. } => None,
        }
    }
}

/// Pushes the release tag and creates the draft release
#[derive(Clone)]
pub struct Publisher {
    remote: Arc<dyn RemoteRepository>,
}

impl Publisher {
    pub fn new(remote: Arc<dyn RemoteRepository>) -> Self {
        Self { remote }
    }

    /// Publish `decision.expected_tag` at `commit`
    ///
    /// The release is only created once the tag push succeeded. An existing
    /// tag is a conflict and is never overwritten; a pushed tag is never
    /// rolled back.
    pub async fn publish(
        &self,
        decision: &ReleaseDecision,
        commit: &str,
    ) -> Result<PublicationRecord, PublishError> {
        let tag = decision.expected_tag.clone();

        if !decision.should_release {
            return Err(PublishError::NotReleasable { tag });
        }

        match self.remote.push_tag(&tag, commit).await {
            Ok(()) => info!("Tag {} created at {}", tag, commit),
            Err(RemoteError::TagExists { .. }) => {
                warn!("Tag {} already exists, another run published it", tag);
                return Err(PublishError::TagConflict { tag });
            }
            Err(source) => return Err(PublishError::TagPush { tag, source }),
        }

        let release_id = self
            .remote
            .create_draft_release(&tag, &tag)
            .await
            .map_err(|source| PublishError::ReleaseCreation {
                tag: tag.clone(),
                source,
            })?;

        info!("Draft release {} created for {}", release_id, tag);
        Ok(PublicationRecord {
            tag,
            release_id: Some(release_id),
            state: PublicationState::Draft,
        })
    }
}
