//! Dispatch and dependency-gating flows through the facade.

use marshal::core::{TaskId, TaskStatus};
use marshal::orchestration::{DispatchRequest, DispatchStatus};
use marshal::{AgentName, AgentStatus, Error};

use crate::fixtures::Harness;

#[tokio::test]
async fn test_dispatch_on_absent_dependency_queues() {
    let harness = Harness::new();

    // T001 has never been created.
    let outcome = harness
        .orchestrator
        .dispatch(
            DispatchRequest::new(AgentName::Natasha, "design API")
                .with_dependencies(vec![TaskId(1)]),
        )
        .await
        .unwrap();

    assert_eq!(outcome.status, DispatchStatus::Queued);
    assert_eq!(outcome.blocked_by, vec![TaskId(1)]);

    let report = harness.orchestrator.get_status(Some(AgentName::Natasha)).await;
    assert_eq!(report.agents[0].status, AgentStatus::Blocked);
    assert_eq!(report.tasks[0].status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_busy_agent_dispatch_fails_without_side_effects() {
    let harness = Harness::new();
    harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "first task"))
        .await
        .unwrap();

    let err = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "second task"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AgentBusy { .. }));

    let report = harness.orchestrator.get_status(None).await;
    assert_eq!(report.summary.tasks_total, 1);
    assert_eq!(report.summary.agents_working, 1);
    let ironman = report
        .agents
        .iter()
        .find(|a| a.name == AgentName::Ironman)
        .unwrap();
    assert_eq!(ironman.current_task, Some(TaskId(1)));
}

#[tokio::test]
async fn test_in_progress_implies_dependencies_completed() {
    let harness = Harness::new();
    let first = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "schema"))
        .await
        .unwrap();
    harness
        .orchestrator
        .dispatch(
            DispatchRequest::new(AgentName::Natasha, "api")
                .with_dependencies(vec![first.task]),
        )
        .await
        .unwrap();
    harness.orchestrator.complete_task(first.task).await.unwrap();

    // Every in_progress task must have only completed dependencies.
    let report = harness.orchestrator.get_status(None).await;
    for task in report
        .tasks
        .iter()
        .filter(|t| t.status == TaskStatus::InProgress)
    {
        for dep in &task.dependencies {
            let dep_task = report.tasks.iter().find(|t| t.id == *dep).unwrap();
            assert_eq!(dep_task.status, TaskStatus::Completed);
        }
    }
}

#[tokio::test]
async fn test_full_chain_dispatch_complete_promote() {
    let harness = Harness::new();
    let schema = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "database schema"))
        .await
        .unwrap();
    let api = harness
        .orchestrator
        .dispatch(
            DispatchRequest::new(AgentName::Natasha, "API over the schema")
                .with_dependencies(vec![schema.task])
                .isolated(),
        )
        .await
        .unwrap();
    let docs = harness
        .orchestrator
        .dispatch(
            DispatchRequest::new(AgentName::Vision, "document the API")
                .with_dependencies(vec![api.task]),
        )
        .await
        .unwrap();

    let promoted = harness.orchestrator.complete_task(schema.task).await.unwrap();
    assert_eq!(promoted, vec![api.task]);

    let promoted = harness.orchestrator.complete_task(api.task).await.unwrap();
    assert_eq!(promoted, vec![docs.task]);

    harness.orchestrator.complete_task(docs.task).await.unwrap();
    let report = harness.orchestrator.get_status(None).await;
    assert_eq!(report.summary.tasks_completed, 3);
    assert_eq!(report.summary.agents_idle, 7);
}

#[tokio::test]
async fn test_assign_with_unfinished_dependency_blocks_assignee() {
    let harness = Harness::new();
    let schema = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "schema"))
        .await
        .unwrap();

    // The dependency exists but is still in progress.
    let review = harness
        .orchestrator
        .assign_task("review the schema", Some(AgentName::Vision), vec![schema.task])
        .await
        .unwrap();

    let report = harness.orchestrator.get_status(Some(AgentName::Vision)).await;
    assert_eq!(report.agents[0].status, AgentStatus::Blocked);
    assert_eq!(report.agents[0].current_task, Some(review.id));
    assert_eq!(report.tasks[0].status, TaskStatus::Pending);

    // Completing the dependency promotes the assigned task.
    let promoted = harness.orchestrator.complete_task(schema.task).await.unwrap();
    assert_eq!(promoted, vec![review.id]);
    let report = harness.orchestrator.get_status(Some(AgentName::Vision)).await;
    assert_eq!(report.agents[0].status, AgentStatus::Working);
}

#[tokio::test]
async fn test_assign_then_ids_strictly_increasing() {
    let harness = Harness::new();
    let mut previous = 0;
    for i in 0..6 {
        let task = harness
            .orchestrator
            .assign_task(&format!("step {}", i), None, vec![])
            .await
            .unwrap();
        assert_eq!(task.id.as_u32(), previous + 1);
        previous = task.id.as_u32();
    }
}

#[tokio::test]
async fn test_provisioning_failure_degrades_not_fails() {
    let harness = Harness::new();
    harness.workspaces.fail_provisioning();

    let outcome = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Natasha, "isolated work").isolated())
        .await
        .unwrap();

    assert_eq!(outcome.status, DispatchStatus::Dispatched);
    assert!(outcome.workspace.is_none());
    assert!(!outcome.warnings.is_empty());
}
