//! Labels pending changes that will produce a release once merged

use crate::core::context::Trigger;
use crate::release::ReleaseDecision;
use crate::vcs::{LabelOutcome, RemoteError, RemoteRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// What the annotator did for a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Annotation {
    /// Label applied, or already present
    Labelled { change: u64, label: String, result: LabelOutcome },
    /// Push run, no pending change to label
    NoPendingChange,
    /// Decision says no release
    NotReleasing,
}

impl std::fmt::Display for Annotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Annotation::Labelled { change, label, result: LabelOutcome::Added } => {
                write!(f, "labelled #{} with '{}'", change, label)
            }
            Annotation::Labelled { change, label, result: LabelOutcome::AlreadyPresent } => {
                write!(f, "#{} already labelled '{}'", change, label)
            }
            Annotation::NoPendingChange => write!(f, "no pending change"),
            Annotation::NotReleasing => write!(f, "no release due"),
        }
    }
}

#[derive(Clone)]
pub struct Annotator {
    remote: Arc<dyn RemoteRepository>,
    label: String,
}

impl Annotator {
    pub fn new(remote: Arc<dyn RemoteRepository>, label: impl Into<String>) -> Self {
        Self {
            remote,
            label: label.into(),
        }
    }

    pub async fn annotate(
        &self,
        decision: &ReleaseDecision,
        trigger: &Trigger,
    ) -> Result<Annotation, RemoteError> {
        let Some(change) = trigger.pending_change() else {
            debug!("No pending change, nothing to label");
            return Ok(Annotation::NoPendingChange);
        };
        if !decision.should_release {
            debug!("Change #{} does not release, nothing to label", change);
            return Ok(Annotation::NotReleasing);
        }

        let result = self.remote.add_label(change, &self.label).await?;
        info!("Change #{} will release {}", change, decision.expected_tag);

        Ok(Annotation::Labelled {
            change,
            label: self.label.clone(),
            result,
        })
    }
}
