//! Completion-validation policy through the facade.

use marshal::orchestration::{Strictness, Tally, TestTallies};
use marshal::{AgentName, Error};

use crate::fixtures::Harness;

fn tallies(unit_failed: u32, e2e_failed: u32, coverage: f64) -> TestTallies {
    TestTallies {
        unit: Tally::new(20, unit_failed),
        integration: Tally::new(6, 0),
        e2e: Tally::new(3, e2e_failed),
        coverage,
    }
}

#[tokio::test]
async fn test_strict_blocks_on_unit_failure() {
    let harness = Harness::new();
    let task = harness
        .orchestrator
        .assign_task("payment flow", Some(AgentName::Natasha), vec![])
        .await
        .unwrap();

    let result = harness
        .orchestrator
        .validate_completion(
            task.id,
            &[],
            Some(tallies(1, 0, 95.0)),
            &[],
            Some(Strictness::Strict),
        )
        .await
        .unwrap();

    assert!(!result.complete);
    assert!(!result.can_merge);
    assert!(!result.blockers.is_empty());
}

#[tokio::test]
async fn test_moderate_warns_on_e2e_only_failures() {
    let harness = Harness::new();
    let task = harness
        .orchestrator
        .assign_task("signup flow", None, vec![])
        .await
        .unwrap();

    let result = harness
        .orchestrator
        .validate_completion(
            task.id,
            &[],
            Some(tallies(0, 2, 95.0)),
            &[],
            Some(Strictness::Moderate),
        )
        .await
        .unwrap();

    assert!(result.complete);
    assert!(result.blockers.is_empty());
    assert!(!result.warnings.is_empty());
}

#[tokio::test]
async fn test_retry_count_survives_across_calls() {
    let harness = Harness::new();
    let task = harness
        .orchestrator
        .assign_task("retried work", None, vec![])
        .await
        .unwrap();

    let first = harness
        .orchestrator
        .validate_completion(task.id, &[], None, &[], None)
        .await
        .unwrap();
    let second = harness
        .orchestrator
        .validate_completion(task.id, &[], None, &[], None)
        .await
        .unwrap();

    assert_eq!(first.retry_count, 1);
    assert_eq!(second.retry_count, 2);
}

#[tokio::test]
async fn test_validate_unknown_task() {
    let harness = Harness::new();
    let err = harness
        .orchestrator
        .validate_completion(marshal::core::TaskId(77), &[], None, &[], None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::TaskNotFound(_)));
}

#[tokio::test]
async fn test_score_never_gates() {
    let harness = Harness::new();
    let task = harness
        .orchestrator
        .assign_task("scored work", None, vec![])
        .await
        .unwrap();

    // Low score but all blocking conditions clear: still complete.
    let result = harness
        .orchestrator
        .validate_completion(
            task.id,
            &[],
            Some(tallies(0, 0, 85.0)),
            &[],
            Some(Strictness::Moderate),
        )
        .await
        .unwrap();
    assert!(result.complete);
    assert!(result.score < 100);
}
