//! Shared orchestrator state and its durable snapshot form.

pub mod snapshot;
pub mod store;

pub use snapshot::{RestoreReport, Snapshot, SnapshotStore, WorkspaceRecord, FORMAT_VERSION};
pub use store::{AgentTransition, CoreState, StateHandle, StateSummary};
