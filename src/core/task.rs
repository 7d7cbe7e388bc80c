//! Task data model.
//!
//! Tasks are the trackable units of externally-executed work. Each task
//! records its status, assignee, dependency set, and workspace binding.
//! Tasks are never deleted; a finished task stays in the store with
//! status `completed`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::AgentName;
use crate::workspace::WorkspaceRef;

/// Unique identifier for a task within a session.
///
/// Ids come from a monotonically increasing session counter and render as
/// a zero-padded textual form (`T001`, `T002`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u32);

impl TaskId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T{:03}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let digits = s.strip_prefix('T').or_else(|| s.strip_prefix('t')).unwrap_or(s);
        digits
            .parse::<u32>()
            .map(TaskId)
            .map_err(|_| crate::Error::InvalidTaskId(s.to_string()))
    }
}

/// Task status in its lifecycle.
///
/// A task may only be `in_progress` when every task in its dependency set
/// is `completed`; otherwise it queues as `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created but waiting (unmet dependencies or no assignee yet).
    #[default]
    Pending,
    /// Task is being executed by its assignee.
    InProgress,
    /// Work reported finished, awaiting completion validation.
    Review,
    /// Task validated and done. Terminal.
    Completed,
}

impl TaskStatus {
    /// Terminal from the collector's point of view: no longer worth polling.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Advisory priority attached at dispatch time. Never used for scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Critical => write!(f, "critical"),
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

/// Workspace binding for a task.
///
/// Provisioning is deferred for queued tasks: the task carries a marker
/// instead of a created workspace until its dependencies complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum WorkspaceBinding {
    /// Task runs directly in the shared tree.
    #[default]
    None,
    /// Isolation was requested but creation is deferred until the task
    /// actually starts.
    Deferred,
    /// An isolated workspace exists for this task.
    Attached {
        #[serde(rename = "ref")]
        workspace: WorkspaceRef,
    },
}

impl WorkspaceBinding {
    pub fn workspace(&self) -> Option<&WorkspaceRef> {
        match self {
            WorkspaceBinding::Attached { workspace } => Some(workspace),
            _ => None,
        }
    }
}

/// A single trackable unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Session-scoped unique identifier.
    pub id: TaskId,
    /// Short title (dispatch truncates long descriptions).
    pub title: String,
    /// Agent assigned to this task, if any.
    pub assignee: Option<AgentName>,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Ids of tasks that must be completed before this one may start.
    pub dependencies: Vec<TaskId>,
    /// Workspace isolation state.
    pub workspace: WorkspaceBinding,
    /// Advisory priority.
    pub priority: Priority,
    /// Caller-attested acceptance criteria. Reported, never auto-verified.
    pub acceptance_criteria: Vec<String>,
    /// Number of completion validations run against this task.
    pub retry_count: u32,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Create a pending task with the given id and title.
    pub fn new(id: TaskId, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            assignee: None,
            status: TaskStatus::Pending,
            dependencies: Vec::new(),
            workspace: WorkspaceBinding::None,
            priority: Priority::default(),
            acceptance_criteria: Vec::new(),
            retry_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_assignee(mut self, assignee: AgentName) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_finished(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}
