//! Test fixtures for integration tests.

use std::sync::Arc;
use tempfile::TempDir;

use marshal::config::Config;
use marshal::orchestrator::Orchestrator;
use marshal::workspace::StubWorkspaces;

/// An orchestrator wired to a stub workspace provider and a temporary
/// snapshot directory.
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub workspaces: Arc<StubWorkspaces>,
    // Held so the snapshot directory outlives the test body.
    _state_dir: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        let config = Config::default();
        let state_dir = TempDir::new().expect("Failed to create temp directory");
        let workspaces = Arc::new(StubWorkspaces::new());
        let orchestrator = Orchestrator::new(&config, workspaces.clone(), state_dir.path());
        Self {
            orchestrator,
            workspaces,
            _state_dir: state_dir,
        }
    }
}
