//! Dispatch state machine.
//!
//! Dispatch binds a new task to an agent and either starts it or queues
//! it. The busy check and the agent claim happen under a single write
//! guard through the registry's transition primitive, so two concurrent
//! dispatches can never both claim the same agent.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::{Priority, Task, TaskId, TaskStatus, WorkspaceBinding};
use crate::error::{Error, Result};
use crate::roster::AgentName;
use crate::state::{AgentTransition, StateHandle};
use crate::workspace::{WorkspaceProvider, WorkspaceRef};
use crate::{mlog, mlog_warn};

/// How the caller intends to run the dispatched work. Advisory: it only
/// shapes how much of the outcome gets reported, never the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    #[default]
    Background,
    Foreground,
}

/// A dispatch request.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub agent: AgentName,
    pub description: String,
    pub dependencies: Vec<TaskId>,
    pub priority: Priority,
    pub mode: DispatchMode,
    /// Request an isolated workspace for the task.
    pub isolate: bool,
    /// Context files the caller will hand to the worker. Only the count
    /// feeds the duration estimate.
    pub context_files: Vec<String>,
    /// Reference snippets for the worker. Count feeds the estimate.
    pub context_references: Vec<String>,
    pub acceptance_criteria: Vec<String>,
}

impl DispatchRequest {
    pub fn new(agent: AgentName, description: &str) -> Self {
        Self {
            agent,
            description: description.to_string(),
            dependencies: Vec::new(),
            priority: Priority::default(),
            mode: DispatchMode::default(),
            isolate: false,
            context_files: Vec::new(),
            context_references: Vec::new(),
            acceptance_criteria: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn isolated(mut self) -> Self {
        self.isolate = true;
        self
    }
}

/// Effective status of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// Task started; agent is working.
    Dispatched,
    /// Dependencies unmet; task is pending and the agent is blocked.
    Queued,
}

/// What a dispatch call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub task: TaskId,
    pub agent: AgentName,
    pub status: DispatchStatus,
    /// Unmet dependencies, present only when queued.
    pub blocked_by: Vec<TaskId>,
    pub workspace: Option<WorkspaceRef>,
    pub priority: Priority,
    pub mode: DispatchMode,
    /// Advisory duration estimate. Never used for scheduling.
    pub estimated_duration: String,
    pub warnings: Vec<String>,
}

/// Binds tasks to agents, gated by availability and dependencies.
pub struct Dispatcher {
    state: StateHandle,
    workspaces: Arc<dyn WorkspaceProvider>,
}

impl Dispatcher {
    pub fn new(state: StateHandle, workspaces: Arc<dyn WorkspaceProvider>) -> Self {
        Self { state, workspaces }
    }

    /// Dispatch a new task to an agent.
    ///
    /// If every dependency is completed the task starts immediately
    /// (in_progress, agent working) and a workspace is provisioned when
    /// requested. Otherwise the task queues as pending, the agent is
    /// blocked holding it, and workspace creation is deferred.
    ///
    /// Provisioning failure is non-fatal: the task proceeds without
    /// isolation and the outcome carries a warning.
    ///
    /// # Errors
    /// Returns `AgentBusy` if the agent is already working. No other
    /// agent is ever mutated.
    pub async fn dispatch(&self, request: DispatchRequest) -> Result<DispatchOutcome> {
        let mut warnings = Vec::new();
        let mut state = self.state.write().await;

        if !state.agent(request.agent).is_available() {
            let current = state
                .agent(request.agent)
                .current_task
                .map(|t| t.to_string())
                .unwrap_or_default();
            return Err(Error::AgentBusy {
                agent: request.agent.to_string(),
                task: current,
            });
        }

        let unmet = state.unmet_dependencies(&request.dependencies);
        let id = state.next_task_id();
        let starts_now = unmet.is_empty();

        // Provision before the claim so a started task and its workspace
        // appear together. The write guard is held throughout; the busy
        // check above cannot go stale.
        let workspace = if starts_now && request.isolate {
            match self.workspaces.provision(id, request.agent) {
                Ok(ws) => Some(ws),
                Err(e) => {
                    mlog_warn!("Workspace for {} unavailable: {}", id, e);
                    warnings.push(format!(
                        "workspace creation failed, task proceeds without isolation: {}",
                        e
                    ));
                    None
                }
            }
        } else {
            None
        };

        let transition = if starts_now {
            AgentTransition::StartWork {
                task: id,
                workspace: workspace.clone(),
            }
        } else {
            AgentTransition::Queue { task: id }
        };
        if !state.transition_agent(request.agent, transition) {
            // Unreachable while the guard is held, kept as the authoritative
            // refusal path for the transition primitive.
            return Err(Error::AgentBusy {
                agent: request.agent.to_string(),
                task: String::new(),
            });
        }

        let binding = match (&workspace, starts_now, request.isolate) {
            (Some(ws), _, _) => WorkspaceBinding::Attached {
                workspace: ws.clone(),
            },
            (None, false, true) => WorkspaceBinding::Deferred,
            _ => WorkspaceBinding::None,
        };

        let mut task = Task::new(id, Self::title_of(&request.description))
            .with_assignee(request.agent)
            .with_dependencies(request.dependencies.clone())
            .with_priority(request.priority);
        task.status = if starts_now {
            TaskStatus::InProgress
        } else {
            TaskStatus::Pending
        };
        task.workspace = binding;
        task.acceptance_criteria = request.acceptance_criteria.clone();
        state.insert_task(task);
        drop(state);

        let status = if starts_now {
            DispatchStatus::Dispatched
        } else {
            DispatchStatus::Queued
        };
        mlog!(
            "Dispatch {}: {} -> {:?} (blocked_by: {:?})",
            id,
            request.agent,
            status,
            unmet
        );

        Ok(DispatchOutcome {
            task: id,
            agent: request.agent,
            status,
            blocked_by: unmet,
            workspace,
            priority: request.priority,
            mode: request.mode,
            estimated_duration: Self::estimate(&request),
            warnings,
        })
    }

    /// Tasks store a short title; long descriptions are truncated.
    fn title_of(description: &str) -> &str {
        match description.char_indices().nth(100) {
            Some((idx, _)) => &description[..idx],
            None => description,
        }
    }

    /// Advisory duration estimate from the agent's base plus context size.
    fn estimate(request: &DispatchRequest) -> String {
        let minutes = request.agent.base_estimate_minutes()
            + request.context_files.len() as u64 * 5
            + request.context_references.len() as u64 * 2;
        if minutes < 60 {
            format!("~{} minutes", minutes)
        } else {
            format!("~{:.1} hours", minutes as f64 / 60.0)
        }
    }
}
