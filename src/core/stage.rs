//! Stage domain model

use crate::core::{
    condition::StageCondition,
    config::{BuiltinAction, StageConfig},
    state::StageState,
};
use std::collections::HashSet;

/// What a stage does when it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageAction {
    /// Shell commands run in order; the first failing command fails the stage
    Shell { commands: Vec<String> },
    /// Push the release tag, then create the draft release
    PublishRelease,
    /// Label the pending change when a release is due
    Annotate,
}

impl StageAction {
    pub fn describe(&self) -> String {
        match self {
            StageAction::Shell { commands } => format!("{} command(s)", commands.len()),
            StageAction::PublishRelease => "publish-release".to_string(),
            StageAction::Annotate => "annotate".to_string(),
        }
    }
}

/// A single stage in the graph
#[derive(Debug, Clone)]
pub struct Stage {
    /// Unique stage identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Stage IDs this stage depends on
    pub dependencies: Vec<String>,

    /// Evaluated right before the stage starts
    pub condition: StageCondition,

    pub action: StageAction,

    /// Artifacts recorded when the stage completes
    pub produces: Vec<String>,

    /// Artifacts that must exist before the stage starts
    pub consumes: Vec<String>,

    /// Exempt from fail-fast cancellation (upload/cleanup)
    pub always_run: bool,

    /// Timeout in seconds
    pub timeout_secs: u64,

    /// Runtime state
    pub state: StageState,
}

#[derive(Debug, Clone)]
pub struct StageDefaults {
    pub timeout_secs: u64,
}

impl Default for StageDefaults {
    fn default() -> Self {
        Self {
            timeout_secs: 1800, // 30 minutes
        }
    }
}

impl Stage {
    /// Create a stage from its config
    pub fn from_config(config: &StageConfig, defaults: &StageDefaults) -> Self {
        let action = match config.uses {
            Some(BuiltinAction::PublishRelease) => StageAction::PublishRelease,
            Some(BuiltinAction::Annotate) => StageAction::Annotate,
            None => StageAction::Shell {
                commands: config.run.clone(),
            },
        };

        Stage {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            dependencies: config.depends_on.clone(),
            condition: config.when.clone(),
            action,
            produces: config.produces.clone(),
            consumes: config.consumes.clone(),
            always_run: config.always_run,
            timeout_secs: config.timeout_secs.unwrap_or(defaults.timeout_secs),
            state: StageState::Pending,
        }
    }

    /// Check if every dependency completed successfully
    pub fn dependencies_satisfied(&self, completed: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep))
    }

    /// Check if every dependency reached a terminal state, whatever the outcome
    pub fn dependencies_settled(&self, terminal: &HashSet<String>) -> bool {
        self.dependencies.iter().all(|dep| terminal.contains(dep))
    }
}
