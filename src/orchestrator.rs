//! The orchestrator facade.
//!
//! One owned state object wired through every component; no ambient
//! singleton. Each public method is an independently invocable operation:
//! nothing is implicitly chained, and the real work a task represents
//! always happens outside this process. The orchestrator only tracks,
//! gates, and aggregates what the caller reports.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::core::{
    ExecutionPlan, Task, TaskId, TaskStatus, WorkspaceBinding,
};
use crate::error::{Error, Result};
use crate::orchestration::{
    AggregatedResult, CompletionValidator, DispatchOutcome, DispatchRequest, Dispatcher,
    PlanBuilder, ResultCollector, StageInputs, Strictness, TestTallies, ValidationResult,
};
use crate::roster::{AgentName, AgentState};
use crate::state::{
    AgentTransition, CoreState, RestoreReport, Snapshot, SnapshotStore, StateHandle, StateSummary,
};
use crate::workspace::WorkspaceProvider;
use crate::{mlog, mlog_warn};

/// Point-in-time view returned by `get_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub agents: Vec<AgentState>,
    pub tasks: Vec<Task>,
    pub summary: StateSummary,
}

/// Owns the session state and wires the orchestration components.
pub struct Orchestrator {
    state: StateHandle,
    workspaces: Arc<dyn WorkspaceProvider>,
    dispatcher: Dispatcher,
    collector: ResultCollector,
    validator: CompletionValidator,
    snapshots: SnapshotStore,
    default_strictness: Strictness,
}

impl Orchestrator {
    /// Wire up a fresh session with the given workspace provider and
    /// snapshot directory.
    pub fn new(config: &Config, workspaces: Arc<dyn WorkspaceProvider>, state_dir: &Path) -> Self {
        let state = CoreState::handle();
        Self {
            dispatcher: Dispatcher::new(state.clone(), workspaces.clone()),
            collector: ResultCollector::new(
                state.clone(),
                workspaces.clone(),
                config.poll_interval(),
            ),
            validator: CompletionValidator::new(state.clone(), config.coverage_threshold),
            snapshots: SnapshotStore::new(state_dir),
            default_strictness: config.strictness,
            state,
            workspaces,
        }
    }

    /// Shared handle to the underlying state, for callers that need reads
    /// beyond the canned reports.
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Dispatch a task to an agent. See [`Dispatcher::dispatch`].
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome> {
        self.dispatcher.dispatch(request).await
    }

    /// Current agents and tasks, optionally narrowed to one agent and the
    /// tasks assigned to it.
    pub async fn get_status(&self, agent: Option<AgentName>) -> StatusReport {
        let state = self.state.read().await;
        let (agents, tasks) = match agent {
            Some(name) => (
                vec![state.agent(name).clone()],
                state
                    .tasks()
                    .filter(|t| t.assignee == Some(name))
                    .cloned()
                    .collect(),
            ),
            None => (
                state.agents().cloned().collect(),
                state.tasks().cloned().collect(),
            ),
        };
        StatusReport {
            agents,
            tasks,
            summary: state.summary(),
        }
    }

    /// Create a pending task without dispatching it.
    ///
    /// Assignment never starts work: the task stays pending even when its
    /// dependencies are already met, and no workspace is created. An
    /// assignee with unfinished dependencies is marked blocked holding the
    /// queued task; completing the dependencies promotes it the same way a
    /// queued dispatch is promoted. An assignee already working stays
    /// untouched.
    ///
    /// # Errors
    /// Returns `UnknownDependencyTask` if a dependency id is not in the
    /// store at all. Dependencies that exist but are unfinished queue the
    /// task rather than erroring.
    pub async fn assign_task(
        &self,
        title: &str,
        assignee: Option<AgentName>,
        dependencies: Vec<TaskId>,
    ) -> Result<Task> {
        let mut state = self.state.write().await;
        for dep in &dependencies {
            if state.task(*dep).is_none() {
                return Err(Error::UnknownDependencyTask(dep.to_string()));
            }
        }
        let unmet = state.unmet_dependencies(&dependencies);
        let id = state.next_task_id();
        let mut task = Task::new(id, title).with_dependencies(dependencies);
        task.assignee = assignee;
        state.insert_task(task.clone());
        if let Some(assignee) = assignee {
            if !unmet.is_empty() {
                // Refused for a working agent, which keeps its current task.
                state.transition_agent(assignee, AgentTransition::Queue { task: id });
            }
        }
        mlog!("Assigned {}: {:?} <- {:?}", id, title, assignee);
        Ok(task)
    }

    /// Build a staged execution plan. Pure; touches no state.
    pub fn build_execution_plan(
        &self,
        required: &[AgentName],
        inputs: &StageInputs,
    ) -> ExecutionPlan {
        PlanBuilder::build(required, inputs)
    }

    /// Collect and aggregate results for a set of tasks.
    pub async fn collect_results(
        &self,
        ids: &[TaskId],
        timeout: Duration,
    ) -> AggregatedResult {
        self.collector.collect(ids, timeout).await
    }

    /// Validate a task's completion evidence. Uses the configured default
    /// strictness when the caller passes none.
    pub async fn validate_completion(
        &self,
        task: TaskId,
        criteria: &[String],
        tallies: Option<TestTallies>,
        documentation: &[String],
        strictness: Option<Strictness>,
    ) -> Result<ValidationResult> {
        self.validator
            .validate(
                task,
                criteria,
                tallies,
                documentation,
                strictness.unwrap_or(self.default_strictness),
            )
            .await
    }

    /// Record a caller-reported status for a task. Completion must go
    /// through [`Orchestrator::complete_task`] so the agent is released
    /// and queued work is promoted.
    ///
    /// # Errors
    /// `TaskNotFound` if the id is absent.
    pub async fn record_status(&self, id: TaskId, status: TaskStatus) -> Result<()> {
        if status == TaskStatus::Completed {
            self.complete_task(id).await?;
            return Ok(());
        }
        let mut state = self.state.write().await;
        let current = state
            .task(id)
            .map(|t| t.status)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        state.transition_task(id, current, status);
        Ok(())
    }

    /// Mark a task completed, release its agent, and start any queued
    /// tasks whose dependency set is now fully met.
    ///
    /// Promotion provisions deferred workspaces; a provisioning failure
    /// still promotes, without isolation. Returns the promoted task ids.
    ///
    /// # Errors
    /// `TaskNotFound` if the id is absent.
    pub async fn complete_task(&self, id: TaskId) -> Result<Vec<TaskId>> {
        let mut state = self.state.write().await;
        let task = state
            .task(id)
            .cloned()
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;

        let current = task.status;
        if current != TaskStatus::Completed {
            state.transition_task(id, current, TaskStatus::Completed);
        }
        if let Some(assignee) = task.assignee {
            if state.agent(assignee).current_task == Some(id) {
                state.transition_agent(assignee, AgentTransition::Release);
            }
        }
        mlog!("Completed {}", id);

        // Promote queued tasks whose dependencies are all met now.
        let candidates: Vec<(TaskId, AgentName, WorkspaceBinding)> = state
            .tasks()
            .filter(|t| t.status == TaskStatus::Pending && t.assignee.is_some())
            .filter(|t| {
                !t.dependencies.is_empty() && state.unmet_dependencies(&t.dependencies).is_empty()
            })
            .map(|t| {
                (
                    t.id,
                    t.assignee.unwrap_or(AgentName::Captain),
                    t.workspace.clone(),
                )
            })
            .collect();

        let mut promoted = Vec::new();
        for (task_id, agent, binding) in candidates {
            if !state.agent(agent).is_available() {
                continue;
            }
            let workspace = if binding == WorkspaceBinding::Deferred {
                match self.workspaces.provision(task_id, agent) {
                    Ok(ws) => Some(ws),
                    Err(e) => {
                        mlog_warn!("Deferred workspace for {} unavailable: {}", task_id, e);
                        None
                    }
                }
            } else {
                None
            };
            if !state.transition_agent(
                agent,
                AgentTransition::StartWork {
                    task: task_id,
                    workspace: workspace.clone(),
                },
            ) {
                continue;
            }
            state.transition_task(task_id, TaskStatus::Pending, TaskStatus::InProgress);
            state.bind_workspace(
                task_id,
                match workspace {
                    Some(ws) => WorkspaceBinding::Attached { workspace: ws },
                    None => WorkspaceBinding::None,
                },
            );
            mlog!("Promoted {} -> in_progress ({})", task_id, agent);
            promoted.push(task_id);
        }
        Ok(promoted)
    }

    /// Write a durable snapshot of the whole session. Returns the
    /// snapshot id.
    pub async fn snapshot_state(&self, id: Option<&str>, reason: Option<&str>) -> Result<String> {
        let snapshot = {
            let state = self.state.read().await;
            Snapshot::capture(&state, reason)
        };
        self.snapshots.save(&snapshot, id)
    }

    /// Replace the session state from a snapshot, demoting tasks whose
    /// workspace no longer exists.
    pub async fn restore_state(&self, id: &str) -> Result<RestoreReport> {
        let mut state = self.state.write().await;
        self.snapshots
            .restore(id, &mut state, self.workspaces.as_ref())
    }
}
