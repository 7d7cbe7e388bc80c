//! Execution plan builder.
//!
//! Walks the fixed stage order and emits one group per stage that has at
//! least one required roster member. Each included group waits on the
//! previous included group; stages with no members are skipped without
//! breaking the wait-chain.

use std::collections::BTreeMap;

use crate::core::{ExecutionGroup, ExecutionPlan, PlannedTask, StageKind, STAGE_ORDER};
use crate::mlog_debug;
use crate::roster::{AgentName, ROSTER};

/// Free-form task descriptions per stage. Stages without an entry fall
/// back to a generic description.
#[derive(Debug, Clone, Default)]
pub struct StageInputs {
    descriptions: BTreeMap<StageKind, String>,
}

impl StageInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: StageKind, description: &str) -> Self {
        self.descriptions.insert(stage, description.to_string());
        self
    }

    fn description(&self, stage: StageKind) -> String {
        self.descriptions
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| format!("{} work for this request", stage))
    }
}

/// Builds staged execution plans from a required-roster list.
pub struct PlanBuilder;

impl PlanBuilder {
    /// Build the plan for a classified request.
    ///
    /// The required roster may contain duplicates and agents with no
    /// stage (captain orchestrates, it is never planned); both are
    /// ignored. Task order within a group follows roster insertion
    /// order regardless of the order the caller listed agents in.
    /// An all-skipped request produces an empty, no-op plan.
    pub fn build(required: &[AgentName], inputs: &StageInputs) -> ExecutionPlan {
        let mut groups: Vec<ExecutionGroup> = Vec::new();

        for stage in STAGE_ORDER {
            let members: Vec<AgentName> = ROSTER
                .iter()
                .copied()
                .filter(|agent| {
                    required.contains(agent) && StageKind::for_agent(*agent) == Some(stage)
                })
                .collect();
            if members.is_empty() {
                continue;
            }

            let wait_for = groups
                .last()
                .map(|prev: &ExecutionGroup| vec![prev.id.clone()])
                .unwrap_or_default();
            let description = inputs.description(stage);
            let tasks = members
                .into_iter()
                .map(|agent| PlannedTask {
                    agent,
                    description: description.clone(),
                    stage,
                })
                .collect();
            groups.push(ExecutionGroup {
                id: format!("G{}", groups.len() + 1),
                stage,
                tasks,
                wait_for,
                runner: stage.runner(),
            });
        }

        mlog_debug!(
            "Planned {} group(s) for roster of {}",
            groups.len(),
            required.len()
        );
        ExecutionPlan { groups }
    }
}
