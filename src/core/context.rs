//! Run context - the snapshot every stage receives

use crate::core::state::StageState;
use crate::release::ReleaseDecision;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of event that triggered the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    /// Push to a branch
    Push,
    /// Update of a pull request (a pending change)
    PullRequest,
}

/// What started the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub event: TriggerEvent,

    /// Git ref of the run (e.g. "refs/heads/main")
    pub git_ref: String,

    /// Commit the run checked out
    pub commit: String,

    /// Pending change number, for pull request runs
    pub change: Option<u64>,
}

impl Trigger {
    /// Branch name without the `refs/heads/` prefix
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.git_ref)
    }

    /// Pending change this run belongs to, if it is one
    pub fn pending_change(&self) -> Option<u64> {
        match self.event {
            TriggerEvent::PullRequest => self.change,
            TriggerEvent::Push => None,
        }
    }
}

/// An opaque named output of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// Stage that produced it
    pub producer: String,
}

/// Inputs snapshotted once at run start
///
/// Never refreshed during the run: the decision computed here is the one every
/// stage sees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: Uuid,
    pub trigger: Trigger,
    pub decision: ReleaseDecision,
    /// Directory shell stages run in
    pub workdir: PathBuf,
}

/// Context for executing one stage
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run: RunContext,

    /// Stage being executed
    pub stage_id: String,

    /// Final state of each direct dependency
    pub upstream: HashMap<String, StageState>,

    /// Artifacts produced so far in this run
    pub artifacts: BTreeMap<String, Artifact>,
}

impl StageContext {
    pub fn decision(&self) -> &ReleaseDecision {
        &self.run.decision
    }

    /// True when every direct dependency completed successfully
    pub fn upstream_succeeded(&self) -> bool {
        self.upstream.values().all(StageState::is_success)
    }

    pub fn has_artifact(&self, name: &str) -> bool {
        self.artifacts.contains_key(name)
    }

    /// Environment exported to shell stages
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env: Vec<(String, String)> = self
            .run
            .decision
            .outputs()
            .into_iter()
            .map(|(key, value)| (key.replace('-', "_").to_uppercase(), value))
            .collect();

        env.push(("PIPELINE_RUN_ID".to_string(), self.run.run_id.to_string()));
        env.push(("PIPELINE_STAGE".to_string(), self.stage_id.clone()));
        env.push(("PIPELINE_COMMIT".to_string(), self.run.trigger.commit.clone()));
        env.push(("PIPELINE_REF".to_string(), self.run.trigger.git_ref.clone()));
        env.push((
            "PIPELINE_ARTIFACTS".to_string(),
            self.artifacts.keys().cloned().collect::<Vec<_>>().join(","),
        ));

        env
    }
}
