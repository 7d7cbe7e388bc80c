//! Core domain models for marshal orchestration.
//!
//! This module contains the fundamental data structures used throughout
//! the orchestration system: tasks and the staged execution plan.

pub mod plan;
pub mod task;

pub use plan::{ExecutionGroup, ExecutionPlan, PlannedTask, RunnerClass, StageKind, STAGE_ORDER};
pub use task::{Priority, Task, TaskId, TaskStatus, WorkspaceBinding};
