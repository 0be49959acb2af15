//! Stage graph domain model

use crate::core::{
    config::PipelineConfig,
    context::{Artifact, RunContext, StageContext},
    stage::{Stage, StageDefaults},
    state::{ExecutionStatus, FailureKind, RunState, StageState},
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// A failed stage, as reported to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage_id: String,
    pub kind: FailureKind,
    pub error: String,
    /// Stage output up to the failure (a publication record for publish stages)
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output: String,
}

/// A pipeline's stages and their dependency edges
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// Pipeline name
    pub name: String,

    /// Stages by ID
    pub stages: HashMap<String, Stage>,

    /// Run state
    pub state: RunState,

    /// Artifacts produced by completed stages
    pub artifacts: BTreeMap<String, Artifact>,

    /// Wall-clock budget of a run, in seconds
    pub timeout_secs: Option<u64>,

    /// Stage execution order (topological sort)
    execution_order: Vec<String>,
}

impl StageGraph {
    /// Create a graph from configuration
    pub fn from_config(config: &PipelineConfig) -> Self {
        let defaults = config
            .default_timeout_secs
            .map(|timeout_secs| StageDefaults { timeout_secs })
            .unwrap_or_default();

        let stages: HashMap<String, Stage> = config
            .stages
            .iter()
            .map(|stage_config| {
                let stage = Stage::from_config(stage_config, &defaults);
                (stage.id.clone(), stage)
            })
            .collect();

        let execution_order = Self::topological_sort(&stages);

        StageGraph {
            name: config.name.clone(),
            stages,
            state: RunState::new(),
            artifacts: BTreeMap::new(),
            timeout_secs: config.timeout_secs,
            execution_order,
        }
    }

    /// Get a stage by ID
    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.get(id)
    }

    /// Get a mutable stage by ID
    pub fn stage_mut(&mut self, id: &str) -> Option<&mut Stage> {
        self.stages.get_mut(id)
    }

    fn ids_where(&self, predicate: impl Fn(&StageState) -> bool) -> HashSet<String> {
        self.stages
            .values()
            .filter(|s| predicate(&s.state))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Pending stages that may start now, in execution order
    ///
    /// Regular stages need every dependency completed; `always_run` stages only
    /// need every dependency settled.
    pub fn ready_stages(&self) -> Vec<&Stage> {
        let completed = self.ids_where(StageState::is_success);
        let terminal = self.ids_where(StageState::is_terminal);

        self.execution_order
            .iter()
            .filter_map(|id| self.stages.get(id))
            .filter(|s| matches!(s.state, StageState::Pending))
            .filter(|s| {
                if s.always_run {
                    s.dependencies_settled(&terminal)
                } else {
                    s.dependencies_satisfied(&completed)
                }
            })
            .collect()
    }

    /// Get all currently running stages
    pub fn running_stages(&self) -> Vec<&Stage> {
        self.stages
            .values()
            .filter(|s| matches!(s.state, StageState::Running { .. }))
            .collect()
    }

    /// Settle pending stages that can no longer run
    ///
    /// A failed or cancelled dependency cancels its dependents at once. A
    /// skipped one skips them, but only after every other dependency has
    /// settled, so a later failure still wins. Walking in topological order
    /// carries this transitively in one pass. `always_run` stages are left
    /// alone. Returns what changed.
    pub fn propagate_blocked(&mut self) -> Vec<(String, StageState)> {
        let mut changes = Vec::new();

        for id in self.execution_order.clone() {
            let Some(stage) = self.stages.get(&id) else {
                continue;
            };
            if stage.always_run || !matches!(stage.state, StageState::Pending) {
                continue;
            }

            let deps: Vec<(&String, &StageState)> = stage
                .dependencies
                .iter()
                .filter_map(|dep| self.stages.get(dep).map(|d| (dep, &d.state)))
                .collect();

            let blocked = if let Some((dep, _)) = deps.iter().find(|(_, s)| s.is_unsuccessful()) {
                Some(StageState::Cancelled {
                    reason: format!("dependency '{}' did not succeed", dep),
                })
            } else if deps.iter().all(|(_, s)| s.is_terminal()) {
                deps.iter()
                    .find(|(_, s)| matches!(s, StageState::Skipped { .. }))
                    .map(|(dep, _)| StageState::Skipped {
                        reason: format!("dependency '{}' was skipped", dep),
                    })
            } else {
                None
            };

            if let Some(state) = blocked {
                if let Some(stage) = self.stages.get_mut(&id) {
                    stage.state = state.clone();
                }
                changes.push((id, state));
            }
        }

        changes
    }

    /// Cancel every stage that hasn't started; returns their IDs
    pub fn cancel_pending(&mut self, reason: &str) -> Vec<String> {
        let mut cancelled = Vec::new();
        for id in &self.execution_order {
            if let Some(stage) = self.stages.get_mut(id) {
                if matches!(stage.state, StageState::Pending) {
                    stage.state = StageState::Cancelled {
                        reason: reason.to_string(),
                    };
                    cancelled.push(id.clone());
                }
            }
        }
        cancelled
    }

    /// Check if every stage is in a terminal state
    pub fn is_complete(&self) -> bool {
        self.stages.values().all(|s| s.state.is_terminal())
    }

    /// Get execution order (topological sort)
    pub fn execution_order(&self) -> &[String] {
        &self.execution_order
    }

    /// Record the artifacts a completed stage declared
    pub fn record_artifacts(&mut self, stage_id: &str) {
        if let Some(stage) = self.stages.get(stage_id) {
            for name in &stage.produces {
                self.artifacts.insert(
                    name.clone(),
                    Artifact {
                        name: name.clone(),
                        producer: stage_id.to_string(),
                    },
                );
            }
        }
    }

    /// Failed stages, in execution order
    pub fn failures(&self) -> Vec<StageFailure> {
        self.execution_order
            .iter()
            .filter_map(|id| self.stages.get(id))
            .filter_map(|s| match &s.state {
                StageState::Failed {
                    error, kind, output, ..
                } => Some(StageFailure {
                    stage_id: s.id.clone(),
                    kind: *kind,
                    error: error.clone(),
                    output: output.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Status implied by the stage states
    pub fn final_status(&self) -> ExecutionStatus {
        if self.failures().is_empty() {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        }
    }

    /// Refresh the run state counters
    pub fn update_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        for stage in self.stages.values() {
            match &stage.state {
                StageState::Completed { .. } => completed += 1,
                StageState::Failed { .. } => failed += 1,
                StageState::Skipped { .. } | StageState::Cancelled { .. } => skipped += 1,
                _ => {}
            }
        }

        self.state.update_counts(completed, failed, skipped);
    }

    /// Calculate topological sort of stages based on dependencies
    fn topological_sort(stages: &HashMap<String, Stage>) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        // Sort for deterministic order
        let mut stage_ids: Vec<_> = stages.keys().cloned().collect();
        stage_ids.sort();

        for stage_id in stage_ids {
            Self::visit(&stage_id, stages, &mut visited, &mut result);
        }

        result
    }

    fn visit(
        stage_id: &str,
        stages: &HashMap<String, Stage>,
        visited: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) {
        if !visited.insert(stage_id.to_string()) {
            return;
        }

        if let Some(stage) = stages.get(stage_id) {
            let mut deps = stage.dependencies.clone();
            deps.sort();
            for dep in &deps {
                Self::visit(dep, stages, visited, result);
            }
        }

        result.push(stage_id.to_string());
    }

    /// Create the execution context for a stage
    pub fn context_for_stage(&self, stage_id: &str, run: &RunContext) -> StageContext {
        let upstream = self
            .stages
            .get(stage_id)
            .map(|stage| {
                stage
                    .dependencies
                    .iter()
                    .filter_map(|dep| self.stages.get(dep).map(|d| (dep.clone(), d.state.clone())))
                    .collect()
            })
            .unwrap_or_default();

        StageContext {
            run: run.clone(),
            stage_id: stage_id.to_string(),
            upstream,
            artifacts: self.artifacts.clone(),
        }
    }
}
