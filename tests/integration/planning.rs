//! Execution-plan building scenarios.

use marshal::core::StageKind;
use marshal::orchestration::StageInputs;
use marshal::AgentName;

use crate::fixtures::Harness;

#[tokio::test]
async fn test_research_implementation_verification_pipeline() {
    let harness = Harness::new();
    let plan = harness.orchestrator.build_execution_plan(
        &[
            AgentName::Jarvis,
            AgentName::Ironman,
            AgentName::Natasha,
            AgentName::Groot,
        ],
        &StageInputs::new(),
    );

    assert_eq!(plan.groups.len(), 3);

    assert_eq!(plan.groups[0].stage, StageKind::Research);
    assert_eq!(plan.groups[0].tasks.len(), 1);
    assert!(plan.groups[0].wait_for.is_empty());

    assert_eq!(plan.groups[1].stage, StageKind::Implementation);
    assert_eq!(plan.groups[1].tasks.len(), 2);
    assert_eq!(plan.groups[1].wait_for, vec![plan.groups[0].id.clone()]);

    assert_eq!(plan.groups[2].stage, StageKind::Verification);
    assert_eq!(plan.groups[2].tasks.len(), 1);
    assert_eq!(plan.groups[2].wait_for, vec![plan.groups[1].id.clone()]);

    assert!(plan.validate().is_ok());
}

#[tokio::test]
async fn test_all_five_stages() {
    let harness = Harness::new();
    let plan = harness.orchestrator.build_execution_plan(
        &[
            AgentName::Jarvis,
            AgentName::DrStrange,
            AgentName::Natasha,
            AgentName::Groot,
            AgentName::Vision,
        ],
        &StageInputs::new(),
    );

    let stages: Vec<StageKind> = plan.groups.iter().map(|g| g.stage).collect();
    assert_eq!(
        stages,
        vec![
            StageKind::Research,
            StageKind::Planning,
            StageKind::Implementation,
            StageKind::Verification,
            StageKind::Documentation,
        ]
    );
    // Each group waits on exactly the previous one.
    for window in plan.groups.windows(2) {
        assert_eq!(window[1].wait_for, vec![window[0].id.clone()]);
    }
}

#[tokio::test]
async fn test_empty_roster_is_noop_plan() {
    let harness = Harness::new();
    let plan = harness
        .orchestrator
        .build_execution_plan(&[], &StageInputs::new());
    assert!(plan.is_empty());
}

#[tokio::test]
async fn test_intra_group_tasks_share_no_dependencies() {
    let harness = Harness::new();
    let plan = harness.orchestrator.build_execution_plan(
        &[AgentName::Ironman, AgentName::Natasha],
        &StageInputs::new(),
    );

    // Both implementers land in the same group; the builder never creates
    // a wait relationship inside a group.
    assert_eq!(plan.groups.len(), 1);
    assert_eq!(plan.groups[0].tasks.len(), 2);
    assert!(plan.groups[0].wait_for.is_empty());
}
