//! Durable JSON snapshots of orchestrator state.
//!
//! Snapshots are explicit, caller-triggered saves; there is no automatic
//! replication. A snapshot carries everything needed to resume a session:
//! the task counter, agents, tasks, and the workspace references that were
//! live at save time. Restore re-validates workspace references against
//! the provider and demotes tasks whose workspace disappeared.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::{Task, TaskId, TaskStatus, WorkspaceBinding};
use crate::error::{Error, Result};
use crate::roster::{AgentName, AgentState, AgentStatus};
use crate::state::store::CoreState;
use crate::workspace::WorkspaceProvider;
use crate::{mlog_debug, mlog_warn};

/// Current snapshot format version. Bump on incompatible layout changes.
pub const FORMAT_VERSION: u32 = 1;

/// A workspace reference captured at save time, denormalized for
/// validation on restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub task: TaskId,
    pub agent: Option<AgentName>,
    pub path: PathBuf,
    pub branch: String,
}

/// Durable record of a full orchestrator session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub session: Uuid,
    pub saved_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub counter: u32,
    pub agents: Vec<AgentState>,
    pub tasks: Vec<Task>,
    pub workspaces: Vec<WorkspaceRecord>,
}

impl Snapshot {
    /// Capture the current state.
    pub fn capture(state: &CoreState, reason: Option<&str>) -> Self {
        let workspaces = state
            .tasks()
            .filter_map(|task| {
                task.workspace.workspace().map(|ws| WorkspaceRecord {
                    task: task.id,
                    agent: task.assignee,
                    path: ws.path.clone(),
                    branch: ws.branch.clone(),
                })
            })
            .collect();
        Self {
            format_version: FORMAT_VERSION,
            session: Uuid::new_v4(),
            saved_at: Utc::now(),
            reason: reason.map(String::from),
            counter: state.counter(),
            agents: state.agents().cloned().collect(),
            tasks: state.tasks().cloned().collect(),
            workspaces,
        }
    }
}

/// Outcome of a restore, including what had to be repaired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreReport {
    pub snapshot_id: String,
    pub saved_at: DateTime<Utc>,
    pub agents_restored: usize,
    pub tasks_restored: usize,
    pub workspaces_valid: usize,
    /// Tasks whose saved workspace no longer exists.
    pub workspaces_missing: Vec<TaskId>,
    /// Tasks demoted from in_progress back to pending.
    pub demoted: Vec<TaskId>,
}

/// Directory-backed snapshot storage.
///
/// Each save writes `<id>.json` and mirrors it to `latest.json`, so a
/// restore without an explicit id resumes the most recent session.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Ids of every snapshot present on disk, sorted.
    pub fn available(&self) -> Vec<String> {
        let mut ids: Vec<String> = fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| {
                        let name = e.file_name().to_string_lossy().into_owned();
                        name.strip_suffix(".json").map(String::from)
                    })
                    .collect()
            })
            .unwrap_or_default();
        ids.sort();
        ids
    }

    /// Write a snapshot under `id` (timestamp-derived when omitted) and
    /// update `latest.json`. Returns the id used.
    pub fn save(&self, snapshot: &Snapshot, id: Option<&str>) -> Result<String> {
        fs::create_dir_all(&self.dir)?;
        let id = id
            .map(String::from)
            .unwrap_or_else(|| snapshot.saved_at.format("%Y-%m-%dT%H-%M-%S").to_string());
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(self.dir.join(format!("{}.json", id)), &json)?;
        fs::write(self.dir.join("latest.json"), &json)?;
        mlog_debug!("Snapshot saved: id={} tasks={}", id, snapshot.tasks.len());
        Ok(id)
    }

    /// Load a snapshot by id.
    ///
    /// # Errors
    /// Returns `StateFile` (with the list of available ids) when the file
    /// is missing, unparsable, or from an unknown format version.
    pub fn load(&self, id: &str) -> Result<Snapshot> {
        let path = self.dir.join(format!("{}.json", id));
        if !path.exists() {
            return Err(Error::StateFile {
                reason: format!("no such snapshot: {}", id),
                available: self.available(),
            });
        }
        let content = fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| Error::StateFile {
            reason: format!("invalid snapshot {}: {}", id, e),
            available: self.available(),
        })?;
        if snapshot.format_version != FORMAT_VERSION {
            return Err(Error::StateFile {
                reason: format!(
                    "snapshot {} has unsupported format version {}",
                    id, snapshot.format_version
                ),
                available: self.available(),
            });
        }
        Ok(snapshot)
    }

    /// Load `id` and apply it to `state`, validating workspace references
    /// against `provider`.
    ///
    /// A task whose saved workspace no longer exists loses the reference;
    /// if it was in_progress it is demoted back to pending and its
    /// agent's busy state is cleared.
    pub fn restore(
        &self,
        id: &str,
        state: &mut CoreState,
        provider: &dyn WorkspaceProvider,
    ) -> Result<RestoreReport> {
        let snapshot = self.load(id)?;

        let mut missing: Vec<TaskId> = Vec::new();
        let mut valid = 0usize;
        for record in &snapshot.workspaces {
            let ws = crate::workspace::WorkspaceRef::new(record.path.clone(), &record.branch);
            if provider.verify(&ws) {
                valid += 1;
            } else {
                mlog_warn!(
                    "Workspace for {} no longer exists: {}",
                    record.task,
                    record.path.display()
                );
                missing.push(record.task);
            }
        }

        let mut demoted: Vec<TaskId> = Vec::new();
        let mut tasks = snapshot.tasks.clone();
        for task in &mut tasks {
            if missing.contains(&task.id) {
                task.workspace = WorkspaceBinding::None;
                if task.status == TaskStatus::InProgress {
                    task.status = TaskStatus::Pending;
                    demoted.push(task.id);
                }
            }
        }

        let mut agents = snapshot.agents.clone();
        for agent in &mut agents {
            if let Some(current) = agent.current_task {
                if demoted.contains(&current) {
                    agent.status = AgentStatus::Idle;
                    agent.current_task = None;
                    agent.workspace = None;
                }
            }
        }

        let report = RestoreReport {
            snapshot_id: id.to_string(),
            saved_at: snapshot.saved_at,
            agents_restored: agents.len(),
            tasks_restored: tasks.len(),
            workspaces_valid: valid,
            workspaces_missing: missing,
            demoted,
        };
        state.replace(agents, tasks, snapshot.counter);
        Ok(report)
    }
}
