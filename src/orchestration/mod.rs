//! Orchestration components: planning, dispatch, collection, validation.

pub mod collector;
pub mod dispatcher;
pub mod planner;
pub mod validator;

pub use collector::{
    AggregatedResult, CollectFormat, ConflictRecord, ResultCollector, TaskEntry, TaskOutcome,
};
pub use dispatcher::{DispatchMode, DispatchOutcome, DispatchRequest, DispatchStatus, Dispatcher};
pub use planner::{PlanBuilder, StageInputs};
pub use validator::{
    CompletionValidator, CriteriaReport, Strictness, Tally, TestTallies, ValidationResult,
};
