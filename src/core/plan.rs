//! Execution plan model: sequential groups of parallel tasks.
//!
//! A plan is a two-level DAG by construction: groups run in sequence
//! (each waits on the previous included group) and tasks inside a group
//! run in parallel with no dependencies on each other. This is a
//! deliberate simplification over a general dependency solver.

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::roster::AgentName;

/// Pipeline stages, in the fixed order the planner walks them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Research,
    Planning,
    Implementation,
    Verification,
    Documentation,
}

/// Fixed stage order the plan builder iterates.
pub const STAGE_ORDER: [StageKind; 5] = [
    StageKind::Research,
    StageKind::Planning,
    StageKind::Implementation,
    StageKind::Verification,
    StageKind::Documentation,
];

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Research => "research",
            StageKind::Planning => "planning",
            StageKind::Implementation => "implementation",
            StageKind::Verification => "verification",
            StageKind::Documentation => "documentation",
        }
    }

    /// Which external runner category handles tasks of this stage.
    pub fn runner(&self) -> RunnerClass {
        match self {
            StageKind::Research => RunnerClass::Explore,
            StageKind::Planning => RunnerClass::Plan,
            StageKind::Implementation
            | StageKind::Verification
            | StageKind::Documentation => RunnerClass::GeneralPurpose,
        }
    }

    /// The stage a roster member contributes to, if any.
    ///
    /// Captain orchestrates and is never planned into a stage.
    pub fn for_agent(agent: AgentName) -> Option<StageKind> {
        match agent {
            AgentName::Jarvis => Some(StageKind::Research),
            AgentName::DrStrange => Some(StageKind::Planning),
            AgentName::Ironman | AgentName::Natasha => Some(StageKind::Implementation),
            AgentName::Groot => Some(StageKind::Verification),
            AgentName::Vision => Some(StageKind::Documentation),
            AgentName::Captain => None,
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Concurrency class tag selecting the external runner for a group's tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunnerClass {
    Explore,
    Plan,
    GeneralPurpose,
}

impl std::fmt::Display for RunnerClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerClass::Explore => write!(f, "explore"),
            RunnerClass::Plan => write!(f, "plan"),
            RunnerClass::GeneralPurpose => write!(f, "general-purpose"),
        }
    }
}

/// A planned unit of work inside a group. Not yet a stored task; it becomes
/// one when the group is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedTask {
    pub agent: AgentName,
    pub description: String,
    pub stage: StageKind,
}

/// One sequential pipeline stage containing zero or more parallel tasks.
///
/// Groups are a planning artifact consumed by the dispatcher; they are
/// never persisted as first-class state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionGroup {
    /// Identifier of this group within its plan (e.g. "G1").
    pub id: String,
    /// Stage this group executes.
    pub stage: StageKind,
    /// Tasks to run in parallel, in roster insertion order.
    pub tasks: Vec<PlannedTask>,
    /// Group ids that must all reach a terminal state before this group's
    /// tasks may start.
    pub wait_for: Vec<String>,
    /// Runner category for this group's tasks.
    pub runner: RunnerClass,
}

/// The full ordered pipeline produced by the plan builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub groups: Vec<ExecutionGroup>,
}

impl ExecutionPlan {
    /// An all-skipped request yields an empty, no-op plan.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total planned tasks across all groups.
    pub fn task_count(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }

    /// Verify the wait-chain is well formed: every referenced group exists
    /// and the group graph has a topological order (no cycles).
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut index = HashMap::new();
        for group in &self.groups {
            let node = graph.add_node(group.id.as_str());
            index.insert(group.id.as_str(), node);
        }
        for group in &self.groups {
            for dep in &group.wait_for {
                let from = index.get(dep.as_str()).ok_or_else(|| {
                    Error::Validation(format!(
                        "group {} waits for unknown group {}",
                        group.id, dep
                    ))
                })?;
                graph.add_edge(*from, index[group.id.as_str()], ());
            }
        }
        toposort(&graph, None)
            .map_err(|_| Error::Validation("execution plan wait-chain has a cycle".to_string()))?;
        Ok(())
    }
}
