//! Test utility functions for release-pipeline

#![allow(dead_code)]

use async_trait::async_trait;
use release_pipeline::annotate::Annotator;
use release_pipeline::core::{
    config::PipelineConfig, ExecutionStatus, FailureKind, RunContext, Stage, StageAction,
    StageContext, StageGraph, StageState, Trigger, TriggerEvent,
};
use release_pipeline::execution::{
    ActionExecutor, ExecutionEngine, ExecutionEvent, SchedulingStrategy, StageExecutor,
    StageOutcome,
};
use release_pipeline::publish::Publisher;
use release_pipeline::release::ReleaseGate;
use release_pipeline::vcs::{InMemoryRemote, RemoteRepository};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Executor that scripts shell stages and runs builtin actions for real
/// against an in-memory remote
pub struct MockExecutor {
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    actions: ActionExecutor,
    executed: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new(remote: Arc<InMemoryRemote>) -> Self {
        let remote: Arc<dyn RemoteRepository> = remote;
        Self {
            failing: HashSet::new(),
            delays: HashMap::new(),
            actions: ActionExecutor::new(
                Publisher::new(remote.clone()),
                Annotator::new(remote, "release"),
            ),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Make a shell stage fail
    pub fn failing(mut self, stage_id: &str) -> Self {
        self.failing.insert(stage_id.to_string());
        self
    }

    /// Make a shell stage take this long
    pub fn delayed(mut self, stage_id: &str, delay: Duration) -> Self {
        self.delays.insert(stage_id.to_string(), delay);
        self
    }

    /// Stages that were handed to the executor, in start order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl StageExecutor for MockExecutor {
    async fn execute(&self, stage: &Stage, context: &StageContext) -> StageOutcome {
        self.executed.lock().unwrap().push(stage.id.clone());

        if let Some(delay) = self.delays.get(&stage.id) {
            tokio::time::sleep(*delay).await;
        }

        match stage.action {
            StageAction::Shell { .. } if self.failing.contains(&stage.id) => {
                StageOutcome::failed(format!("{}: exit status 1", stage.id))
            }
            StageAction::Shell { .. } => StageOutcome::Success {
                output: format!("{} ok", stage.id),
            },
            _ => self.actions.execute(stage, context).await,
        }
    }
}

/// Builder for the run context a test pipeline sees
pub struct RunBuilder {
    declared: String,
    detected: Option<String>,
    event: TriggerEvent,
    git_ref: String,
    commit: String,
    change: Option<u64>,
}

impl RunBuilder {
    pub fn new(declared: &str) -> Self {
        Self {
            declared: declared.to_string(),
            detected: None,
            event: TriggerEvent::Push,
            git_ref: "refs/heads/main".to_string(),
            commit: "0123abcd".to_string(),
            change: None,
        }
    }

    pub fn detected(mut self, tag: &str) -> Self {
        self.detected = Some(tag.to_string());
        self
    }

    pub fn pull_request(mut self, change: u64) -> Self {
        self.event = TriggerEvent::PullRequest;
        self.git_ref = format!("refs/pull/{}/merge", change);
        self.change = Some(change);
        self
    }

    pub fn git_ref(mut self, git_ref: &str) -> Self {
        self.git_ref = git_ref.to_string();
        self
    }

    pub fn commit(mut self, commit: &str) -> Self {
        self.commit = commit.to_string();
        self
    }

    pub fn build(self) -> RunContext {
        let version = self
            .declared
            .parse()
            .unwrap_or_else(|e| panic!("Invalid version '{}': {}", self.declared, e));
        RunContext {
            run_id: uuid::Uuid::new_v4(),
            trigger: Trigger {
                event: self.event,
                git_ref: self.git_ref,
                commit: self.commit,
                change: self.change,
            },
            decision: ReleaseGate::default().decide(version, self.detected.as_deref()),
            workdir: PathBuf::from("."),
        }
    }
}

/// Test result from running a pipeline
pub struct PipelineTestResult {
    pub graph: StageGraph,
    pub status: ExecutionStatus,
    pub events: Vec<ExecutionEvent>,
}

impl PipelineTestResult {
    pub fn state(&self, stage_id: &str) -> &StageState {
        &self
            .graph
            .stage(stage_id)
            .unwrap_or_else(|| panic!("Stage '{}' not found in result", stage_id))
            .state
    }

    pub fn summary(&self) -> String {
        let states: Vec<String> = self
            .graph
            .execution_order()
            .iter()
            .map(|id| format!("{}={:?}", id, self.state(id)))
            .collect();
        format!("{:?}: {}", self.status, states.join(", "))
    }
}

/// Parse a stage graph from YAML
pub fn graph_from_yaml(yaml: &str) -> StageGraph {
    PipelineConfig::from_yaml(yaml)
        .unwrap_or_else(|e| panic!("Failed to parse pipeline YAML: {}", e))
        .to_graph()
}

/// Run a pipeline with the given executor
pub async fn run_pipeline(
    yaml: &str,
    run: &RunContext,
    executor: Arc<dyn StageExecutor>,
    strategy: SchedulingStrategy,
) -> PipelineTestResult {
    let mut graph = graph_from_yaml(yaml);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();

    let engine = ExecutionEngine::new(executor, strategy)
        .with_event_handler(move |event| sink.lock().unwrap().push(event));
    let status = engine
        .execute(&mut graph, run)
        .await
        .unwrap_or_else(|e| panic!("Engine error: {}", e));

    let events = events.lock().unwrap().clone();
    PipelineTestResult {
        graph,
        status,
        events,
    }
}

pub fn assert_run_status(result: &PipelineTestResult, expected: ExecutionStatus) {
    assert_eq!(
        result.status,
        expected,
        "Unexpected run status: {}",
        result.summary()
    );
}

pub fn assert_stage_completed(result: &PipelineTestResult, stage_id: &str) {
    assert!(
        matches!(result.state(stage_id), StageState::Completed { .. }),
        "Stage '{}' should be completed: {}",
        stage_id,
        result.summary()
    );
}

pub fn assert_stage_failed(result: &PipelineTestResult, stage_id: &str, expected: FailureKind) {
    match result.state(stage_id) {
        StageState::Failed { kind, .. } => assert_eq!(
            *kind, expected,
            "Stage '{}' failed with the wrong kind",
            stage_id
        ),
        other => panic!("Stage '{}' should have failed, but was {:?}", stage_id, other),
    }
}

pub fn assert_stage_skipped(result: &PipelineTestResult, stage_id: &str) {
    assert!(
        matches!(result.state(stage_id), StageState::Skipped { .. }),
        "Stage '{}' should be skipped: {}",
        stage_id,
        result.summary()
    );
}

pub fn assert_stage_cancelled(result: &PipelineTestResult, stage_id: &str) {
    assert!(
        matches!(result.state(stage_id), StageState::Cancelled { .. }),
        "Stage '{}' should be cancelled: {}",
        stage_id,
        result.summary()
    );
}

/// The release pipeline most scenarios run
pub const RELEASE_PIPELINE: &str = r#"
name: "Release"
release:
  label: "release"
stages:
  - id: verify
    run: ["cargo test"]
  - id: build
    depends_on: [verify]
    run: ["cargo build --release"]
    produces: [binary]
  - id: docs
    depends_on: [build]
    run: ["cargo doc"]
  - id: publish
    depends_on: [build]
    uses: publish-release
    consumes: [binary]
    when:
      release: true
      event: push
      branch: main
  - id: annotate
    uses: annotate
    when:
      release: true
      event: pull_request
  - id: cleanup
    depends_on: [docs, publish]
    always_run: true
    run: ["rm -rf target/tmp"]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_pipeline_with_mock_simple() {
        let remote = Arc::new(InMemoryRemote::new());
        let executor = Arc::new(MockExecutor::new(remote));
        let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

        let result = run_pipeline(
            "name: \"Minimal\"\nstages:\n  - id: only\n    run: [\"true\"]\n",
            &run,
            executor.clone(),
            SchedulingStrategy::Sequential,
        )
        .await;

        assert_run_status(&result, ExecutionStatus::Completed);
        assert_stage_completed(&result, "only");
        assert_eq!(executor.executed(), vec!["only"]);
    }

    #[test]
    fn test_run_builder() {
        let run = RunBuilder::new("0.2.0").detected("v0.1.0").pull_request(9).build();
        assert!(run.decision.should_release);
        assert_eq!(run.trigger.pending_change(), Some(9));
        assert_eq!(run.trigger.git_ref, "refs/pull/9/merge");
    }
}
