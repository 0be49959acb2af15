//! Test: Failure propagation, condition skips and exempt stages

use crate::helpers::*;
use release_pipeline::core::{ExecutionStatus, FailureKind};
use release_pipeline::execution::{ExecutionEvent, SchedulingStrategy};
use release_pipeline::vcs::InMemoryRemote;
use std::sync::Arc;
use std::time::Duration;

/// Build fails: docs and publication are cancelled, cleanup still runs
#[tokio::test]
async fn test_build_failure_cancels_docs_and_publish() {
    let remote = Arc::new(InMemoryRemote::new());
    let executor = Arc::new(MockExecutor::new(remote.clone()).failing("build"));
    let run = RunBuilder::new("0.1.0").detected("v0.0.9").build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        executor.clone(),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Failed);
    assert_stage_completed(&result, "verify");
    assert_stage_failed(&result, "build", FailureKind::StageFailure);
    assert_stage_cancelled(&result, "docs");
    assert_stage_cancelled(&result, "publish");
    assert_stage_completed(&result, "cleanup");

    assert!(!executor.executed().contains(&"publish".to_string()));
    assert!(remote.tags().await.is_empty());

    let failures = result.graph.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].stage_id, "build");
}

/// Cancellation is transitive through regular stages
#[tokio::test]
async fn test_cancellation_is_transitive() {
    let yaml = r#"
name: "Chain"
stages:
  - id: a
    run: ["true"]
  - id: b
    depends_on: [a]
    run: ["true"]
  - id: c
    depends_on: [b]
    run: ["true"]
  - id: report
    depends_on: [c]
    always_run: true
    when:
      upstream: failed
    run: ["notify.sh"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(
        yaml,
        &run,
        Arc::new(MockExecutor::new(remote).failing("a")),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_stage_cancelled(&result, "b");
    assert_stage_cancelled(&result, "c");
    assert_stage_completed(&result, "report");
}

/// Closed gate: publication is skipped, not failed
#[tokio::test]
async fn test_closed_gate_skips_publication() {
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Completed);
    assert_stage_completed(&result, "build");
    assert_stage_skipped(&result, "publish");
    assert_stage_skipped(&result, "annotate");
    assert_stage_completed(&result, "cleanup");
    assert!(remote.tags().await.is_empty());
}

/// Only pushes to the release branch publish
#[tokio::test]
async fn test_feature_branch_does_not_publish() {
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.2.0")
        .detected("v0.1.0")
        .git_ref("refs/heads/feature/faster-builds")
        .build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Completed);
    assert_stage_skipped(&result, "publish");
    assert!(remote.tags().await.is_empty());
}

/// A condition skip propagates as a skip
#[tokio::test]
async fn test_skip_propagates_to_dependents() {
    let yaml = r#"
name: "Skip chain"
stages:
  - id: publish
    uses: publish-release
    when:
      release: true
  - id: announce
    depends_on: [publish]
    run: ["announce.sh"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(
        yaml,
        &run,
        Arc::new(MockExecutor::new(remote)),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Completed);
    assert_stage_skipped(&result, "publish");
    assert_stage_skipped(&result, "announce");
    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StageSkipped { stage_id, reason }
            if stage_id == "announce" && reason.contains("publish")
    )));
}

/// An exempt upload stage fails when its input was never produced
#[tokio::test]
async fn test_missing_artifact_fails_exempt_stage() {
    let yaml = r#"
name: "Coverage"
stages:
  - id: coverage
    run: ["cargo llvm-cov --lcov --output-path lcov.info"]
    produces: [coverage-report]
  - id: upload
    depends_on: [coverage]
    always_run: true
    consumes: [coverage-report]
    run: ["upload.sh lcov.info"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let executor = Arc::new(MockExecutor::new(remote).failing("coverage"));
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(yaml, &run, executor.clone(), SchedulingStrategy::Sequential).await;

    assert_stage_failed(&result, "upload", FailureKind::StageFailure);
    assert_eq!(executor.executed(), vec!["coverage"]);
    assert!(result.events.iter().any(|e| matches!(
        e,
        ExecutionEvent::StageFailed { stage_id, error, .. }
            if stage_id == "upload" && error.contains("coverage-report")
    )));
}

/// A failure settled after a sibling's skip still cancels the dependent
#[tokio::test]
async fn test_late_failure_overrides_earlier_skip() {
    let yaml = r#"
name: "Mixed upstream"
stages:
  - id: publish
    uses: publish-release
    when:
      release: true
  - id: docs
    run: ["cargo doc"]
  - id: deploy
    depends_on: [publish, docs]
    run: ["deploy.sh"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let executor = Arc::new(
        MockExecutor::new(remote)
            .failing("docs")
            .delayed("docs", Duration::from_millis(50)),
    );
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(yaml, &run, executor.clone(), SchedulingStrategy::Parallel).await;

    assert_run_status(&result, ExecutionStatus::Failed);
    assert_stage_skipped(&result, "publish");
    assert_stage_failed(&result, "docs", FailureKind::StageFailure);
    assert_stage_cancelled(&result, "deploy");
    assert!(!executor.executed().contains(&"deploy".to_string()));
}
