//! The fixed worker roster and per-agent state.
//!
//! Agents are named slots from a closed roster. They are created once at
//! startup and never destroyed; only their status and task/workspace
//! references change over a session.

use serde::{Deserialize, Serialize};

use crate::core::TaskId;
use crate::error::Error;
use crate::workspace::WorkspaceRef;

/// Identity of a worker in the fixed roster.
///
/// The roster is closed by construction: every agent the orchestrator will
/// ever track is a variant here, so status switches are exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentName {
    Captain,
    Ironman,
    Natasha,
    Groot,
    Jarvis,
    DrStrange,
    Vision,
}

/// Full roster in insertion order. Task ordering within an execution group
/// follows this order.
pub const ROSTER: [AgentName; 7] = [
    AgentName::Captain,
    AgentName::Ironman,
    AgentName::Natasha,
    AgentName::Groot,
    AgentName::Jarvis,
    AgentName::DrStrange,
    AgentName::Vision,
];

impl AgentName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::Captain => "captain",
            AgentName::Ironman => "ironman",
            AgentName::Natasha => "natasha",
            AgentName::Groot => "groot",
            AgentName::Jarvis => "jarvis",
            AgentName::DrStrange => "dr-strange",
            AgentName::Vision => "vision",
        }
    }

    /// Human-readable role of this agent.
    pub fn role(&self) -> &'static str {
        match self {
            AgentName::Captain => "orchestrator",
            AgentName::Ironman => "fullstack-developer",
            AgentName::Natasha => "backend-developer",
            AgentName::Groot => "test-specialist",
            AgentName::Jarvis => "researcher",
            AgentName::DrStrange => "planner",
            AgentName::Vision => "documentarian",
        }
    }

    /// Tool permissions granted to this agent by the host.
    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            AgentName::Captain => &["readonly"],
            AgentName::Ironman => &["edit", "bash", "write", "read"],
            AgentName::Natasha => &["edit", "bash", "write", "read"],
            AgentName::Groot => &["read", "write-test-only"],
            AgentName::Jarvis => &["readonly", "web-search"],
            AgentName::DrStrange => &["readonly"],
            AgentName::Vision => &["write-docs-only", "read"],
        }
    }

    /// Base duration estimate for a task dispatched to this agent, in minutes.
    /// Advisory only; never used for scheduling decisions.
    pub fn base_estimate_minutes(&self) -> u64 {
        match self {
            AgentName::Captain => 5,
            AgentName::Ironman => 30,
            AgentName::Natasha => 25,
            AgentName::Groot => 20,
            AgentName::Jarvis => 15,
            AgentName::DrStrange => 20,
            AgentName::Vision => 15,
        }
    }
}

impl std::fmt::Display for AgentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AgentName {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "captain" => Ok(AgentName::Captain),
            "ironman" => Ok(AgentName::Ironman),
            "natasha" => Ok(AgentName::Natasha),
            "groot" => Ok(AgentName::Groot),
            "jarvis" => Ok(AgentName::Jarvis),
            "dr-strange" => Ok(AgentName::DrStrange),
            "vision" => Ok(AgentName::Vision),
            other => Err(Error::UnknownAgent(other.to_string())),
        }
    }
}

/// Availability status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent has no current task and can accept work.
    #[default]
    Idle,
    /// Agent is executing its current task.
    Working,
    /// Agent holds a queued task whose dependencies are not yet met.
    Blocked,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Blocked => write!(f, "blocked"),
        }
    }
}

/// Mutable per-agent state tracked by the registry.
///
/// Invariant: `status == Working` if and only if `current_task` is set to an
/// in-progress task; an agent never holds two tasks at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub name: AgentName,
    pub status: AgentStatus,
    pub current_task: Option<TaskId>,
    pub workspace: Option<WorkspaceRef>,
}

impl AgentState {
    /// Create an idle agent with no task or workspace.
    pub fn new(name: AgentName) -> Self {
        Self {
            name,
            status: AgentStatus::Idle,
            current_task: None,
            workspace: None,
        }
    }

    /// True if the agent can accept a new task.
    pub fn is_available(&self) -> bool {
        self.status != AgentStatus::Working
    }
}
