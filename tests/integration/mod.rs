//! Integration test suite for marshal.
//!
//! These tests exercise full orchestration flows through the public
//! facade: dispatch and dependency gating, plan building, result
//! collection with conflicts, completion validation, and snapshot
//! save/restore. The workspace provider is stubbed, so no git
//! repositories or external processes are needed and the suite is safe
//! to run in CI.

mod fixtures;

mod collection;
mod dispatch_flow;
mod persistence;
mod planning;
mod validation_gate;
