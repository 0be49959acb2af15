//! Test: Stage timeouts and the run's wall-clock budget

use crate::helpers::*;
use release_pipeline::core::{ExecutionStatus, FailureKind};
use release_pipeline::execution::{ExecutionEvent, SchedulingStrategy};
use release_pipeline::vcs::InMemoryRemote;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_budget_exceeded_cancels_remaining_stages() {
    let yaml = r#"
name: "Budget"
timeout_secs: 60
stages:
  - id: verify
    run: ["cargo test"]
  - id: build
    depends_on: [verify]
    run: ["cargo build --release"]
  - id: publish
    depends_on: [build]
    uses: publish-release
    when:
      release: true
  - id: cleanup
    depends_on: [publish]
    always_run: true
    run: ["rm -rf target/tmp"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let executor = Arc::new(
        MockExecutor::new(remote.clone()).delayed("build", Duration::from_secs(600)),
    );
    let run = RunBuilder::new("0.1.0").detected("v0.0.9").build();

    let result = run_pipeline(yaml, &run, executor, SchedulingStrategy::Sequential).await;

    assert_run_status(&result, ExecutionStatus::Cancelled);
    assert_stage_completed(&result, "verify");
    assert_stage_failed(&result, "build", FailureKind::Timeout);
    assert_stage_cancelled(&result, "publish");
    assert_stage_cancelled(&result, "cleanup");
    assert!(remote.tags().await.is_empty());
    assert!(matches!(
        result.events.last(),
        Some(ExecutionEvent::RunCompleted { status: ExecutionStatus::Cancelled, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stage_timeout_fails_only_that_stage() {
    let yaml = r#"
name: "Stage timeout"
stages:
  - id: slow
    timeout_secs: 30
    run: ["./integration-tests.sh"]
  - id: lint
    run: ["cargo clippy"]
"#;
    let remote = Arc::new(InMemoryRemote::new());
    let executor = Arc::new(MockExecutor::new(remote).delayed("slow", Duration::from_secs(300)));
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").build();

    let result = run_pipeline(yaml, &run, executor, SchedulingStrategy::Parallel).await;

    assert_run_status(&result, ExecutionStatus::Failed);
    assert_stage_failed(&result, "slow", FailureKind::Timeout);
    assert_stage_completed(&result, "lint");
}

/// Budget runs out between the tag push and the draft release
#[tokio::test(start_paused = true)]
async fn test_abort_after_tag_push_leaves_only_the_tag() {
    let yaml = r#"
name: "Slow release service"
timeout_secs: 120
stages:
  - id: build
    run: ["cargo build --release"]
  - id: publish
    depends_on: [build]
    uses: publish-release
    when:
      release: true
"#;
    let remote = Arc::new(InMemoryRemote::new());
    remote.delay_releases(Duration::from_secs(900)).await;
    let run = RunBuilder::new("0.2.0").detected("v0.1.0").commit("cafe01").build();

    let result = run_pipeline(
        yaml,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Cancelled);
    assert_stage_completed(&result, "build");
    assert_stage_failed(&result, "publish", FailureKind::Timeout);

    // the pushed tag is not rolled back and no release exists
    assert_eq!(
        remote.tags().await.get("v0.2.0"),
        Some(&"cafe01".to_string())
    );
    assert!(remote.releases().await.is_empty());
}
