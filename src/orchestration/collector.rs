//! Result collection and aggregation.
//!
//! Given a set of task ids, the collector waits (bounded) for the ones
//! still in progress, pulls change data from the workspace collaborator,
//! and folds everything into one aggregate with cross-task file-conflict
//! detection. Collection never raises for a bad id or a timeout; both
//! degrade to per-task entries so the rest of the batch still aggregates.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::COLLECT_HARD_CAP_SECS;
use crate::core::{Task, TaskId, TaskStatus};
use crate::error::Result;
use crate::orchestration::validator::Tally;
use crate::roster::AgentName;
use crate::state::StateHandle;
use crate::workspace::WorkspaceProvider;
use crate::{mlog, mlog_debug};

/// Presentation format for a collection report. The aggregation itself
/// never varies by format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectFormat {
    #[default]
    Summary,
    Detailed,
    Json,
}

impl std::str::FromStr for CollectFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "summary" => Ok(CollectFormat::Summary),
            "detailed" => Ok(CollectFormat::Detailed),
            "json" => Ok(CollectFormat::Json),
            other => Err(crate::Error::Validation(format!(
                "unknown format: {} (expected summary, detailed, or json)",
                other
            ))),
        }
    }
}

/// Final disposition of one collected task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure,
    Timeout,
    Cancelled,
    Running,
}

impl TaskOutcome {
    fn tag(&self) -> &'static str {
        match self {
            TaskOutcome::Success => "[OK]",
            TaskOutcome::Failure => "[FAIL]",
            TaskOutcome::Timeout => "[TIMEOUT]",
            TaskOutcome::Cancelled => "[CANCELLED]",
            TaskOutcome::Running => "[RUNNING]",
        }
    }
}

/// Per-task result entry in an aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEntry {
    pub task: TaskId,
    pub agent: Option<AgentName>,
    pub outcome: TaskOutcome,
    pub summary: String,
    pub changed_files: Vec<String>,
    /// Test tallies, when the task reported any.
    pub tests: Option<Tally>,
    /// Short commit reference from the task's workspace.
    pub version: Option<String>,
    pub error: Option<String>,
}

/// A file touched by more than one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub file: String,
    pub agents: Vec<AgentName>,
}

/// Everything a collection call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub entries: Vec<TaskEntry>,
    /// No failed/timed-out/cancelled entries and every entry succeeded.
    pub all_succeeded: bool,
    pub failed: Vec<TaskId>,
    /// Union of changed files across all entries, sorted.
    pub changed_files: Vec<String>,
    pub tests_passed: u32,
    pub tests_failed: u32,
    pub conflicts: Vec<ConflictRecord>,
}

impl AggregatedResult {
    fn from_entries(entries: Vec<TaskEntry>) -> Self {
        let conflicts = detect_conflicts(&entries);

        let mut changed: BTreeSet<String> = BTreeSet::new();
        let mut tests_passed = 0;
        let mut tests_failed = 0;
        for entry in &entries {
            changed.extend(entry.changed_files.iter().cloned());
            if let Some(t) = entry.tests {
                tests_passed += t.passed;
                tests_failed += t.failed;
            }
        }

        let failed: Vec<TaskId> = entries
            .iter()
            .filter(|e| {
                matches!(
                    e.outcome,
                    TaskOutcome::Failure | TaskOutcome::Timeout | TaskOutcome::Cancelled
                )
            })
            .map(|e| e.task)
            .collect();
        let all_succeeded = failed.is_empty()
            && entries.iter().all(|e| e.outcome == TaskOutcome::Success);

        Self {
            entries,
            all_succeeded,
            failed,
            changed_files: changed.into_iter().collect(),
            tests_passed,
            tests_failed,
            conflicts,
        }
    }

    /// Render for the caller. Presentation only; the data is identical
    /// across formats.
    pub fn render(&self, format: CollectFormat) -> Result<String> {
        match format {
            CollectFormat::Summary => Ok(self.render_summary(false)),
            CollectFormat::Detailed => Ok(self.render_summary(true)),
            CollectFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    fn render_summary(&self, detailed: bool) -> String {
        let succeeded = self
            .entries
            .iter()
            .filter(|e| e.outcome == TaskOutcome::Success)
            .count();
        let running = self
            .entries
            .iter()
            .filter(|e| e.outcome == TaskOutcome::Running)
            .count();

        let mut out = String::new();
        out.push_str("## Execution Summary\n\n");
        out.push_str(&format!("Tasks collected: {}\n", self.entries.len()));
        out.push_str(&format!("- Succeeded: {}\n", succeeded));
        out.push_str(&format!("- Failed: {}\n", self.failed.len()));
        if running > 0 {
            out.push_str(&format!("- Still running: {}\n", running));
        }
        out.push_str(&format!("\nFiles changed: {}\n", self.changed_files.len()));
        out.push_str(&format!("Tests passed: {}\n", self.tests_passed));
        out.push_str(&format!("Tests failed: {}\n", self.tests_failed));

        if !self.conflicts.is_empty() {
            out.push_str("\n### Conflicts\n");
            out.push_str("The following files were modified by multiple agents:\n");
            for conflict in &self.conflicts {
                let agents: Vec<&str> = conflict.agents.iter().map(|a| a.as_str()).collect();
                out.push_str(&format!("- {} ({})\n", conflict.file, agents.join(", ")));
            }
        }

        if !self.failed.is_empty() {
            out.push_str("\n### Failed tasks\n");
            for id in &self.failed {
                if let Some(entry) = self.entries.iter().find(|e| e.task == *id) {
                    out.push_str(&format!(
                        "- {}: {}\n",
                        id,
                        entry.error.as_deref().unwrap_or("unknown error")
                    ));
                }
            }
        }

        if detailed {
            out.push_str("\n### Task details\n");
            for entry in &self.entries {
                let agent = entry
                    .agent
                    .map(|a| a.as_str())
                    .unwrap_or("unassigned");
                out.push_str(&format!(
                    "- {} {} ({}): {}\n",
                    entry.outcome.tag(),
                    entry.task,
                    agent,
                    entry.summary
                ));
                if !entry.changed_files.is_empty() {
                    out.push_str(&format!(
                        "  - Files: {}\n",
                        entry.changed_files.join(", ")
                    ));
                }
                if let Some(version) = &entry.version {
                    out.push_str(&format!("  - Version: {}\n", version));
                }
            }
        }

        out
    }
}

/// File path to the set of agents whose success|running task touched it;
/// a file with more than one contributing agent is a conflict. Matching
/// is literal path equality, with no rename or move awareness.
fn detect_conflicts(entries: &[TaskEntry]) -> Vec<ConflictRecord> {
    let mut touched: BTreeMap<&str, BTreeSet<AgentName>> = BTreeMap::new();
    for entry in entries {
        if !matches!(entry.outcome, TaskOutcome::Success | TaskOutcome::Running) {
            continue;
        }
        let Some(agent) = entry.agent else { continue };
        for file in &entry.changed_files {
            touched.entry(file).or_default().insert(agent);
        }
    }
    touched
        .into_iter()
        .filter(|(_, agents)| agents.len() > 1)
        .map(|(file, agents)| ConflictRecord {
            file: file.to_string(),
            agents: agents.into_iter().collect(),
        })
        .collect()
}

/// Waits for in-flight tasks and aggregates their results.
pub struct ResultCollector {
    state: StateHandle,
    workspaces: Arc<dyn WorkspaceProvider>,
    poll_interval: Duration,
}

impl ResultCollector {
    pub fn new(
        state: StateHandle,
        workspaces: Arc<dyn WorkspaceProvider>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            state,
            workspaces,
            poll_interval,
        }
    }

    /// Collect results for the given task ids.
    ///
    /// In-progress tasks are polled until they leave in_progress or the
    /// deadline passes; the effective wait is the caller's timeout capped
    /// at the system-wide maximum. Missing ids and timeouts become
    /// failure/timeout entries, never errors.
    pub async fn collect(&self, ids: &[TaskId], timeout: Duration) -> AggregatedResult {
        let effective = timeout.min(Duration::from_secs(COLLECT_HARD_CAP_SECS));
        let deadline = Instant::now() + effective;
        mlog!(
            "Collecting {} task(s), effective timeout {:?}",
            ids.len(),
            effective
        );

        let mut entries = Vec::with_capacity(ids.len());
        for &id in ids {
            entries.push(self.collect_one(id, deadline, effective).await);
        }
        AggregatedResult::from_entries(entries)
    }

    async fn collect_one(&self, id: TaskId, deadline: Instant, effective: Duration) -> TaskEntry {
        loop {
            let snapshot = {
                let state = self.state.read().await;
                state.task(id).cloned()
            };
            let Some(task) = snapshot else {
                return TaskEntry {
                    task: id,
                    agent: None,
                    outcome: TaskOutcome::Failure,
                    summary: format!("Task not found: {}", id),
                    changed_files: Vec::new(),
                    tests: None,
                    version: None,
                    error: Some(format!("task {} does not exist in the store", id)),
                };
            };

            if task.status.is_terminal() {
                return self.entry_for(&task);
            }
            if Instant::now() >= deadline {
                // Timed out while still in progress; report whatever
                // partial change data is available.
                let (changed_files, version) = self.read_workspace(&task);
                mlog_debug!("Collection of {} timed out after {:?}", id, effective);
                return TaskEntry {
                    task: id,
                    agent: task.assignee,
                    outcome: TaskOutcome::Timeout,
                    summary: format!(
                        "Task timed out after {}s: {}",
                        effective.as_secs(),
                        task.title
                    ),
                    changed_files,
                    tests: None,
                    version,
                    error: Some(format!(
                        "task did not complete within {} seconds",
                        effective.as_secs()
                    )),
                };
            }
            sleep(self.poll_interval).await;
        }
    }

    fn entry_for(&self, task: &Task) -> TaskEntry {
        let outcome = match task.status {
            TaskStatus::Completed => TaskOutcome::Success,
            // Pending and review tasks have not produced a final result.
            TaskStatus::Pending | TaskStatus::Review => TaskOutcome::Running,
            TaskStatus::InProgress => TaskOutcome::Running,
        };
        let (changed_files, version) = self.read_workspace(task);
        TaskEntry {
            task: task.id,
            agent: task.assignee,
            outcome,
            summary: task.title.clone(),
            changed_files,
            tests: None,
            version,
            error: None,
        }
    }

    /// Best-effort workspace reads: failures yield empty data.
    fn read_workspace(&self, task: &Task) -> (Vec<String>, Option<String>) {
        match task.workspace.workspace() {
            Some(ws) => {
                let files = self.workspaces.changed_files(ws).unwrap_or_default();
                let version = self.workspaces.head_version(ws);
                (files, version)
            }
            None => (Vec::new(), None),
        }
    }
}
