//! Workspace provisioning collaborator.
//!
//! The orchestration core does not perform any real work itself; it asks a
//! [`WorkspaceProvider`] for isolated workspaces and reads change data back
//! from them. The default provider is backed by git worktrees; a stub
//! provider exists for tests and dry runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::TaskId;
use crate::error::Result;
use crate::roster::AgentName;
use crate::{mlog_debug, Error};

/// Reference to an isolated workspace created for a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    /// Filesystem location of the workspace.
    pub path: PathBuf,
    /// Branch the workspace's work lands on.
    pub branch: String,
}

impl WorkspaceRef {
    pub fn new(path: impl Into<PathBuf>, branch: &str) -> Self {
        Self {
            path: path.into(),
            branch: branch.to_string(),
        }
    }
}

/// External workspace provisioning service.
///
/// Reads are best-effort by contract: `changed_files` and `head_version`
/// failures degrade to empty data at the call site, never to a hard error.
pub trait WorkspaceProvider: Send + Sync {
    /// Create an isolated workspace for a task.
    fn provision(&self, task: TaskId, agent: AgentName) -> Result<WorkspaceRef>;

    /// Check whether a previously created workspace still exists.
    fn verify(&self, workspace: &WorkspaceRef) -> bool;

    /// Files changed in the workspace, relative to its base.
    fn changed_files(&self, workspace: &WorkspaceRef) -> Result<Vec<String>>;

    /// Short version reference (commit sha) of the workspace head.
    fn head_version(&self, workspace: &WorkspaceRef) -> Option<String>;
}

/// Workspace provider backed by git worktrees.
///
/// Each provisioned workspace is a worktree of the host repository on a
/// fresh `feature/<task>-<agent>` branch, created under the configured
/// worktrees directory.
pub struct GitWorkspaces {
    repo_path: PathBuf,
    worktrees_dir: PathBuf,
}

impl GitWorkspaces {
    /// Create a provider for the repository at `repo_path`, placing
    /// worktrees under `worktrees_dir`.
    ///
    /// # Errors
    /// Returns an error if `repo_path` is not a git repository.
    pub fn new(repo_path: &Path, worktrees_dir: &Path) -> Result<Self> {
        git2::Repository::open(repo_path)?;
        Ok(Self {
            repo_path: repo_path.to_path_buf(),
            worktrees_dir: worktrees_dir.to_path_buf(),
        })
    }

    fn repo(&self) -> Result<git2::Repository> {
        Ok(git2::Repository::open(&self.repo_path)?)
    }

    fn collect_changed(repo: &git2::Repository) -> Result<Vec<String>> {
        let head = repo.head()?.peel_to_commit()?;
        let head_tree = head.tree()?;
        // Diff against the parent commit when there is one; otherwise fall
        // back to the working tree so fresh repos still report something.
        let diff = match head.parent(0) {
            Ok(parent) => {
                repo.diff_tree_to_tree(Some(&parent.tree()?), Some(&head_tree), None)?
            }
            Err(_) => repo.diff_tree_to_workdir_with_index(Some(&head_tree), None)?,
        };
        let mut files: Vec<String> = diff
            .deltas()
            .filter_map(|delta| delta.new_file().path())
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }
}

impl WorkspaceProvider for GitWorkspaces {
    fn provision(&self, task: TaskId, agent: AgentName) -> Result<WorkspaceRef> {
        let branch = format!("feature/{}-{}", task, agent);
        let worktree_name = format!("marshal-{}", task);
        let worktree_path = self.worktrees_dir.join(&worktree_name);
        mlog_debug!(
            "GitWorkspaces::provision branch={} path={}",
            branch,
            worktree_path.display()
        );

        let create = || -> Result<()> {
            std::fs::create_dir_all(&self.worktrees_dir)?;
            let repo = self.repo()?;
            let head = repo.head()?;
            let commit = head.peel_to_commit()?;
            let branch_obj = repo.branch(&branch, &commit, false)?;
            let branch_ref = branch_obj.into_reference();
            let mut opts = git2::WorktreeAddOptions::new();
            opts.reference(Some(&branch_ref));
            // Worktree name must not contain slashes, branch may.
            repo.worktree(&worktree_name, &worktree_path, Some(&opts))?;
            Ok(())
        };

        create().map_err(|e| Error::WorkspaceCreationFailed(e.to_string()))?;
        Ok(WorkspaceRef::new(worktree_path, &branch))
    }

    fn verify(&self, workspace: &WorkspaceRef) -> bool {
        workspace.path.is_dir() && git2::Repository::open(&workspace.path).is_ok()
    }

    fn changed_files(&self, workspace: &WorkspaceRef) -> Result<Vec<String>> {
        let repo = git2::Repository::open(&workspace.path)?;
        Self::collect_changed(&repo)
    }

    fn head_version(&self, workspace: &WorkspaceRef) -> Option<String> {
        let repo = git2::Repository::open(&workspace.path).ok()?;
        let commit = repo.head().ok()?.peel_to_commit().ok()?;
        let sha = commit.id().to_string();
        Some(sha[..8.min(sha.len())].to_string())
    }
}

/// In-memory workspace provider for tests and dry runs.
///
/// Workspaces are never backed by the filesystem; changed files and head
/// versions are whatever the test seeded. Provisioning can be forced to
/// fail to exercise the degraded dispatch path.
#[derive(Default)]
pub struct StubWorkspaces {
    inner: Mutex<StubInner>,
}

#[derive(Default)]
struct StubInner {
    changed: HashMap<PathBuf, Vec<String>>,
    heads: HashMap<PathBuf, String>,
    removed: Vec<PathBuf>,
    fail_provision: bool,
}

impl StubWorkspaces {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StubInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make all subsequent `provision` calls fail.
    pub fn fail_provisioning(&self) {
        self.lock().fail_provision = true;
    }

    /// Seed the changed-file list reported for a workspace path.
    pub fn set_changed_files(&self, workspace: &WorkspaceRef, files: &[&str]) {
        self.lock().changed.insert(
            workspace.path.clone(),
            files.iter().map(|s| s.to_string()).collect(),
        );
    }

    /// Seed the head version reported for a workspace path.
    pub fn set_head_version(&self, workspace: &WorkspaceRef, sha: &str) {
        self.lock()
            .heads
            .insert(workspace.path.clone(), sha.to_string());
    }

    /// Simulate the workspace disappearing from disk.
    pub fn remove(&self, workspace: &WorkspaceRef) {
        self.lock().removed.push(workspace.path.clone());
    }
}

impl WorkspaceProvider for StubWorkspaces {
    fn provision(&self, task: TaskId, agent: AgentName) -> Result<WorkspaceRef> {
        let inner = self.lock();
        if inner.fail_provision {
            return Err(Error::WorkspaceCreationFailed(
                "stub provider configured to fail".to_string(),
            ));
        }
        let branch = format!("feature/{}-{}", task, agent);
        Ok(WorkspaceRef::new(
            PathBuf::from(format!("/stub/marshal-{}", task)),
            &branch,
        ))
    }

    fn verify(&self, workspace: &WorkspaceRef) -> bool {
        !self.lock().removed.contains(&workspace.path)
    }

    fn changed_files(&self, workspace: &WorkspaceRef) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .changed
            .get(&workspace.path)
            .cloned()
            .unwrap_or_default())
    }

    fn head_version(&self, workspace: &WorkspaceRef) -> Option<String> {
        self.lock().heads.get(&workspace.path).cloned()
    }
}
