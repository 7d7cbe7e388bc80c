//! Result collection and conflict detection through the facade.

use std::time::Duration;

use marshal::core::TaskId;
use marshal::orchestration::{CollectFormat, DispatchRequest, TaskOutcome};
use marshal::AgentName;

use crate::fixtures::Harness;

#[tokio::test]
async fn test_collect_unknown_id_never_raises() {
    let harness = Harness::new();
    let result = harness
        .orchestrator
        .collect_results(&[TaskId(999)], Duration::from_secs(1))
        .await;

    assert_eq!(result.entries.len(), 1);
    assert_eq!(result.entries[0].outcome, TaskOutcome::Failure);
    assert_eq!(result.failed, vec![TaskId(999)]);
}

#[tokio::test]
async fn test_conflicting_changes_across_agents() {
    let harness = Harness::new();
    let a = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "frontend").isolated())
        .await
        .unwrap();
    let b = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Natasha, "backend").isolated())
        .await
        .unwrap();

    let ws_a = a.workspace.clone().unwrap();
    let ws_b = b.workspace.clone().unwrap();
    harness
        .workspaces
        .set_changed_files(&ws_a, &["src/routes.rs", "src/app.rs"]);
    harness
        .workspaces
        .set_changed_files(&ws_b, &["src/routes.rs", "src/db.rs"]);

    harness.orchestrator.complete_task(a.task).await.unwrap();
    harness.orchestrator.complete_task(b.task).await.unwrap();

    let result = harness
        .orchestrator
        .collect_results(&[a.task, b.task], Duration::from_secs(1))
        .await;

    assert!(result.all_succeeded);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].file, "src/routes.rs");
    assert_eq!(result.conflicts[0].agents.len(), 2);
    assert_eq!(
        result.changed_files,
        vec![
            "src/app.rs".to_string(),
            "src/db.rs".to_string(),
            "src/routes.rs".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_disjoint_changes_no_conflict() {
    let harness = Harness::new();
    let a = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Ironman, "ui").isolated())
        .await
        .unwrap();
    let b = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Natasha, "api").isolated())
        .await
        .unwrap();

    harness
        .workspaces
        .set_changed_files(&a.workspace.clone().unwrap(), &["src/ui.rs"]);
    harness
        .workspaces
        .set_changed_files(&b.workspace.clone().unwrap(), &["src/api.rs"]);
    harness.orchestrator.complete_task(a.task).await.unwrap();
    harness.orchestrator.complete_task(b.task).await.unwrap();

    let result = harness
        .orchestrator
        .collect_results(&[a.task, b.task], Duration::from_secs(1))
        .await;
    assert!(result.conflicts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_yields_partial_entry() {
    let harness = Harness::new();
    let running = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Groot, "long test run").isolated())
        .await
        .unwrap();
    harness
        .workspaces
        .set_changed_files(&running.workspace.clone().unwrap(), &["tests/suite.rs"]);

    let result = harness
        .orchestrator
        .collect_results(&[running.task], Duration::from_secs(3))
        .await;

    assert_eq!(result.entries[0].outcome, TaskOutcome::Timeout);
    // Partial change data survives the timeout.
    assert_eq!(
        result.entries[0].changed_files,
        vec!["tests/suite.rs".to_string()]
    );
    assert!(!result.all_succeeded);
}

#[tokio::test]
async fn test_render_json_round_trips() {
    let harness = Harness::new();
    let a = harness
        .orchestrator
        .dispatch(DispatchRequest::new(AgentName::Vision, "write docs"))
        .await
        .unwrap();
    harness.orchestrator.complete_task(a.task).await.unwrap();

    let result = harness
        .orchestrator
        .collect_results(&[a.task], Duration::from_secs(1))
        .await;
    let json = result.render(CollectFormat::Json).unwrap();
    assert!(json.contains("\"all_succeeded\": true"));

    let summary = result.render(CollectFormat::Summary).unwrap();
    assert!(summary.contains("Succeeded: 1"));
}
