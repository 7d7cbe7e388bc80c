//! In-memory agent registry and task store.
//!
//! `CoreState` is the single shared mutable state of the orchestrator. It
//! lives behind one `RwLock` (see [`StateHandle`]) and every status change
//! goes through an atomic check-and-transition method, so a busy check and
//! the matching claim can never interleave across concurrent dispatches.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::{Task, TaskId, TaskStatus, WorkspaceBinding};
use crate::roster::{AgentName, AgentState, AgentStatus, ROSTER};
use crate::workspace::WorkspaceRef;

/// Shared handle to the orchestrator state.
///
/// All components hold clones of this handle; there is no ambient
/// singleton. The lock scope of a write guard is the atomicity unit.
pub type StateHandle = Arc<RwLock<CoreState>>;

/// Requested agent status change, applied atomically.
///
/// The variants encode both the new status and the references that belong
/// with it, so a transition can never leave the working/current-task
/// invariant half-applied.
#[derive(Debug, Clone)]
pub enum AgentTransition {
    /// Move an available agent to `working` on the given task.
    /// Refused if the agent is already working.
    StartWork {
        task: TaskId,
        workspace: Option<WorkspaceRef>,
    },
    /// Move an available agent to `blocked`, holding a queued task.
    /// Refused if the agent is already working.
    Queue { task: TaskId },
    /// Return the agent to `idle`, clearing task and workspace references.
    Release,
}

/// Aggregate status counts used by status reports and snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateSummary {
    pub agents_total: usize,
    pub agents_idle: usize,
    pub agents_working: usize,
    pub agents_blocked: usize,
    pub tasks_total: usize,
    pub tasks_pending: usize,
    pub tasks_in_progress: usize,
    pub tasks_review: usize,
    pub tasks_completed: usize,
}

/// The orchestrator's in-memory data model: the fixed agent roster plus
/// every task created this session.
pub struct CoreState {
    agents: BTreeMap<AgentName, AgentState>,
    tasks: BTreeMap<TaskId, Task>,
    counter: u32,
}

impl Default for CoreState {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreState {
    /// Create state with every roster member idle and no tasks.
    pub fn new() -> Self {
        let agents = ROSTER
            .iter()
            .map(|&name| (name, AgentState::new(name)))
            .collect();
        Self {
            agents,
            tasks: BTreeMap::new(),
            counter: 0,
        }
    }

    /// Wrap fresh state in a shared handle.
    pub fn handle() -> StateHandle {
        Arc::new(RwLock::new(Self::new()))
    }

    // Accessors

    pub fn agent(&self, name: AgentName) -> &AgentState {
        // Roster members are inserted at construction and never removed.
        &self.agents[&name]
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentState> {
        self.agents.values()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Dependency ids that are missing from the store or not yet completed.
    pub fn unmet_dependencies(&self, dependencies: &[TaskId]) -> Vec<TaskId> {
        dependencies
            .iter()
            .copied()
            .filter(|id| {
                self.tasks
                    .get(id)
                    .map(|t| t.status != TaskStatus::Completed)
                    .unwrap_or(true)
            })
            .collect()
    }

    // Mutators

    /// Allocate the next session-scoped task id.
    pub fn next_task_id(&mut self) -> TaskId {
        self.counter += 1;
        TaskId(self.counter)
    }

    /// Insert a task. Tasks are never removed; callers must not reuse ids.
    pub fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.id, task);
    }

    /// Atomically apply an agent transition.
    ///
    /// Reads the agent's current status and conditionally writes the new
    /// state in one step, returning whether the transition applied. A
    /// `StartWork` or `Queue` against a working agent is refused and leaves
    /// the agent untouched.
    pub fn transition_agent(&mut self, name: AgentName, transition: AgentTransition) -> bool {
        // Roster members are inserted at construction and never removed.
        let Some(agent) = self.agents.get_mut(&name) else {
            return false;
        };
        match transition {
            AgentTransition::StartWork { task, workspace } => {
                if agent.status == AgentStatus::Working {
                    return false;
                }
                agent.status = AgentStatus::Working;
                agent.current_task = Some(task);
                agent.workspace = workspace;
                true
            }
            AgentTransition::Queue { task } => {
                if agent.status == AgentStatus::Working {
                    return false;
                }
                agent.status = AgentStatus::Blocked;
                agent.current_task = Some(task);
                agent.workspace = None;
                true
            }
            AgentTransition::Release => {
                agent.status = AgentStatus::Idle;
                agent.current_task = None;
                agent.workspace = None;
                true
            }
        }
    }

    /// Atomically move a task from `expect` to `next`.
    ///
    /// Returns false (and changes nothing) if the task is absent or its
    /// current status is not `expect`.
    pub fn transition_task(&mut self, id: TaskId, expect: TaskStatus, next: TaskStatus) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) if task.status == expect => {
                task.status = next;
                true
            }
            _ => false,
        }
    }

    /// Set a task's workspace binding. Does not affect status.
    pub fn bind_workspace(&mut self, id: TaskId, binding: WorkspaceBinding) -> bool {
        match self.tasks.get_mut(&id) {
            Some(task) => {
                task.workspace = binding;
                true
            }
            None => false,
        }
    }

    /// Increment and return a task's validation retry counter.
    pub fn increment_retry(&mut self, id: TaskId) -> Option<u32> {
        self.tasks.get_mut(&id).map(|task| {
            task.retry_count += 1;
            task.retry_count
        })
    }

    /// Replace the whole state. Used by snapshot restore only.
    pub(crate) fn replace(
        &mut self,
        agents: Vec<AgentState>,
        tasks: Vec<Task>,
        counter: u32,
    ) {
        self.agents = ROSTER
            .iter()
            .map(|&name| (name, AgentState::new(name)))
            .collect();
        for agent in agents {
            self.agents.insert(agent.name, agent);
        }
        self.tasks = tasks.into_iter().map(|t| (t.id, t)).collect();
        self.counter = counter;
    }

    /// Aggregate status counts.
    pub fn summary(&self) -> StateSummary {
        let count_agents =
            |s: AgentStatus| self.agents.values().filter(|a| a.status == s).count();
        let count_tasks =
            |s: TaskStatus| self.tasks.values().filter(|t| t.status == s).count();
        StateSummary {
            agents_total: self.agents.len(),
            agents_idle: count_agents(AgentStatus::Idle),
            agents_working: count_agents(AgentStatus::Working),
            agents_blocked: count_agents(AgentStatus::Blocked),
            tasks_total: self.tasks.len(),
            tasks_pending: count_tasks(TaskStatus::Pending),
            tasks_in_progress: count_tasks(TaskStatus::InProgress),
            tasks_review: count_tasks(TaskStatus::Review),
            tasks_completed: count_tasks(TaskStatus::Completed),
        }
    }
}
