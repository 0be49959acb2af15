//! Test: Concurrent runs racing to publish the same tag

use crate::helpers::*;
use release_pipeline::core::{ExecutionStatus, FailureKind};
use release_pipeline::execution::SchedulingStrategy;
use release_pipeline::publish::{PublicationRecord, PublicationState, PublishError, Publisher};
use release_pipeline::release::ReleaseGate;
use release_pipeline::vcs::InMemoryRemote;
use std::sync::Arc;

#[tokio::test]
async fn test_two_publishers_one_release() {
    let remote = Arc::new(InMemoryRemote::new());
    let decision = ReleaseGate::default().decide("0.1.0".parse().unwrap(), Some("v0.0.9"));

    let first = Publisher::new(remote.clone());
    let second = Publisher::new(remote.clone());

    let (a, b) = tokio::join!(
        first.publish(&decision, "commit-a"),
        second.publish(&decision, "commit-b")
    );

    let results = [a, b];
    let drafts = results
        .iter()
        .filter(|r| matches!(r, Ok(record) if record.state == PublicationState::Draft))
        .count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(PublishError::TagConflict { .. })))
        .count();

    assert_eq!(drafts, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(remote.releases().await.len(), 1);
    assert_eq!(remote.tags().await.len(), 1);
}

#[tokio::test]
async fn test_two_pipeline_runs_race_for_the_tag() {
    let remote = Arc::new(InMemoryRemote::new());
    let run_a = RunBuilder::new("0.1.0").detected("v0.0.9").commit("aaa").build();
    let run_b = RunBuilder::new("0.1.0").detected("v0.0.9").commit("bbb").build();

    let (a, b) = tokio::join!(
        run_pipeline(
            RELEASE_PIPELINE,
            &run_a,
            Arc::new(MockExecutor::new(remote.clone())),
            SchedulingStrategy::Parallel,
        ),
        run_pipeline(
            RELEASE_PIPELINE,
            &run_b,
            Arc::new(MockExecutor::new(remote.clone())),
            SchedulingStrategy::Parallel,
        )
    );

    let (winner, loser) = if a.status == ExecutionStatus::Completed {
        (a, b)
    } else {
        (b, a)
    };

    assert_run_status(&winner, ExecutionStatus::Completed);
    assert_stage_completed(&winner, "publish");

    assert_run_status(&loser, ExecutionStatus::Failed);
    assert_stage_failed(&loser, "publish", FailureKind::TagConflict);
    assert_stage_completed(&loser, "cleanup");
    assert_eq!(loser.graph.failures().len(), 1);

    let releases = remote.releases().await;
    assert_eq!(releases.len(), 1);
    assert_eq!(releases[0].tag, "v0.1.0");
}

#[tokio::test]
async fn test_existing_tag_is_reported_as_race() {
    let remote = Arc::new(InMemoryRemote::with_tags([("v0.1.0", "published-earlier")]));
    let run = RunBuilder::new("0.1.0").detected("v0.0.9").build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_stage_failed(&result, "publish", FailureKind::TagConflict);
    assert_stage_completed(&result, "docs");
    assert!(remote.releases().await.is_empty());

    let failures = result.graph.failures();
    let record: PublicationRecord = serde_json::from_str(&failures[0].output).unwrap();
    assert_eq!(record.state, PublicationState::Conflict);
    assert_eq!(record.release_id, None);
    assert_eq!(
        remote.tags().await.get("v0.1.0"),
        Some(&"published-earlier".to_string())
    );
}

#[tokio::test]
async fn test_release_failure_after_push_keeps_tag() {
    let remote = Arc::new(InMemoryRemote::new());
    remote.fail_releases().await;
    let run = RunBuilder::new("0.2.0").detected("v0.1.0").build();

    let result = run_pipeline(
        RELEASE_PIPELINE,
        &run,
        Arc::new(MockExecutor::new(remote.clone())),
        SchedulingStrategy::Sequential,
    )
    .await;

    assert_run_status(&result, ExecutionStatus::Failed);
    assert_stage_failed(&result, "publish", FailureKind::ReleaseCreationFailure);
    assert!(remote.tags().await.contains_key("v0.2.0"));

    let failures = result.graph.failures();
    assert_eq!(failures.len(), 1);
    let record: PublicationRecord = serde_json::from_str(&failures[0].output).unwrap();
    assert_eq!(record.tag, "v0.2.0");
    assert_eq!(record.state, PublicationState::Failed);
}
