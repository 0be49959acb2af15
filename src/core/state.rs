//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every stage completed, was skipped, or was cancelled without a failure
    Completed,
    /// At least one stage failed
    Failed,
    /// Run exceeded its wall-clock budget and was aborted
    Cancelled,
}

/// Why a stage failed
///
/// Publication races are reported separately from defects so an operator can
/// tell "the code is broken" apart from "another run published first".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A build/verify command (or any other stage work) failed
    StageFailure,
    /// The release tag already existed on the remote
    TagConflict,
    /// The tag was pushed but the draft release could not be created
    ReleaseCreationFailure,
    /// The stage ran out of time (its own timeout or the run budget)
    Timeout,
}

impl FailureKind {
    /// Short label for reports
    pub fn describe(&self) -> &'static str {
        match self {
            FailureKind::StageFailure => "stage failure",
            FailureKind::TagConflict => "tag conflict (publication race, not a build defect)",
            FailureKind::ReleaseCreationFailure => "release creation failed after tag push",
            FailureKind::Timeout => "timed out",
        }
    }
}

/// State of a single stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageState {
    /// Waiting for dependencies
    Pending,
    /// Currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Completed successfully
    Completed {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Failed; dependents will be cancelled
    Failed {
        error: String,
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        output: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Condition evaluated false (or a dependency was skipped)
    Skipped {
        reason: String,
    },
    /// Not started because an upstream stage failed or the run was aborted
    Cancelled {
        reason: String,
    },
}

impl StageState {
    /// Check if stage is in a terminal state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StageState::Pending | StageState::Running { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageState::Completed { .. })
    }

    /// Failed or cancelled: work that should have happened didn't
    pub fn is_unsuccessful(&self) -> bool {
        matches!(self, StageState::Failed { .. } | StageState::Cancelled { .. })
    }
}

/// Overall run state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current run status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of stages
    pub total_stages: usize,

    /// Number of completed stages
    pub completed_stages: usize,

    /// Number of failed stages
    pub failed_stages: usize,

    /// Number of skipped or cancelled stages
    pub skipped_stages: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_stages: 0,
            completed_stages: 0,
            failed_stages: 0,
            skipped_stages: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_stages: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_stages = total_stages;
    }

    /// Mark run as finished with the given status
    pub fn finish(&mut self, status: ExecutionStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn update_counts(&mut self, completed: usize, failed: usize, skipped: usize) {
        self.completed_stages = completed;
        self.failed_stages = failed;
        self.skipped_stages = skipped;
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
