//! Test: Labelling pending changes that will release

use crate::helpers::*;
use release_pipeline::core::ExecutionStatus;
use release_pipeline::execution::SchedulingStrategy;
use release_pipeline::vcs::InMemoryRemote;
use std::sync::Arc;

#[tokio::test]
async fn test_pull_request_is_labelled_once() {
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.2.0").detected("v0.1.0").pull_request(42).build();

    for _ in 0..2 {
        let result = run_pipeline(
            RELEASE_PIPELINE,
            &run,
            Arc::new(MockExecutor::new(remote.clone())),
            SchedulingStrategy::Parallel,
        )
        .await;

        assert_run_status(&result, ExecutionStatus::Completed);
        assert_stage_completed(&result, "annotate");
        // publication only happens on pushes
        assert_stage_skipped(&result, "publish");
    }

    let labels = remote.labels(42).await;
    assert_eq!(labels.len(), 1);
    assert!(labels.contains("release"));
    assert!(remote.tags().await.is_empty());
}

#[tokio::test]
async fn test_unchanged_version_is_not_labelled() {
    let remote = Arc::new(InMemoryRemote::new());
    let run = RunBuilder::new("0.1.0").detected("v0.1.0").pull_request(7).build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_stage_skipped(&result, "annotate");
    assert!(remote.labels(7).await.is_empty());
}
