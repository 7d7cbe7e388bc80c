//! Snapshot save/restore through the facade.

use marshal::core::TaskStatus;
use marshal::orchestration::DispatchRequest;
use marshal::{AgentName, AgentStatus, Error};

use crate::fixtures::Harness;

#[tokio::test]
async fn test_save_restore_preserves_session() {
    let harness = Harness::new();
    let a = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "feature work").isolated())
        .await
        .unwrap();
    harness
        .orchestrator
        .assign_task("follow-up", Some(AgentName::Groot), vec![a.task])
        .await
        .unwrap();

    let id = harness
        .orchestrator
        .snapshot_state(Some("mid-session"), Some("before risky merge"))
        .await
        .unwrap();
    assert_eq!(id, "mid-session");

    // Mutate further, then roll back.
    harness.orchestrator.complete_task(a.task).await.unwrap();
    let report = harness.orchestrator.restore_state("mid-session").await.unwrap();
    assert_eq!(report.tasks_restored, 2);
    assert_eq!(report.workspaces_valid, 1);

    let status = harness.orchestrator.get_status(None).await;
    assert_eq!(status.summary.tasks_in_progress, 1);
    assert_eq!(status.summary.agents_working, 1);
}

#[tokio::test]
async fn test_restore_demotes_dangling_workspace() {
    let harness = Harness::new();
    let a = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Natasha, "isolated work").isolated())
        .await
        .unwrap();
    let ws = a.workspace.clone().unwrap();
    harness
        .orchestrator
        .snapshot_state(Some("s"), None)
        .await
        .unwrap();

    // The workspace disappears before restore.
    harness.workspaces.remove(&ws);

    let report = harness.orchestrator.restore_state("s").await.unwrap();
    assert_eq!(report.workspaces_missing, vec![a.task]);
    assert_eq!(report.demoted, vec![a.task]);

    let status = harness.orchestrator.get_status(Some(AgentName::Natasha)).await;
    assert_eq!(status.agents[0].status, AgentStatus::Idle);
    assert!(status.agents[0].current_task.is_none());
    assert_eq!(status.tasks[0].status, TaskStatus::Pending);
}

#[tokio::test]
async fn test_restore_missing_snapshot_offers_hint() {
    let harness = Harness::new();
    harness
        .orchestrator
        .snapshot_state(Some("alpha"), None)
        .await
        .unwrap();

    let err = harness.orchestrator.restore_state("beta").await.unwrap_err();
    match err {
        Error::StateFile { available, .. } => {
            assert!(available.contains(&"alpha".to_string()));
        }
        other => panic!("Expected StateFile error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_counter_continues_after_restore() {
    let harness = Harness::new();
    for i in 0..3 {
        harness
            .orchestrator
            .assign_task(&format!("task {}", i), None, vec![])
            .await
            .unwrap();
    }
    harness
        .orchestrator
        .snapshot_state(Some("s"), None)
        .await
        .unwrap();
    harness.orchestrator.restore_state("s").await.unwrap();

    let task = harness
        .orchestrator
        .assign_task("after restore", None, vec![])
        .await
        .unwrap();
    assert_eq!(task.id.as_u32(), 4);
}
