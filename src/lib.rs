pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod orchestrator;
pub mod roster;
pub mod state;
pub mod workspace;

pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, StatusReport};
pub use roster::{AgentName, AgentState, AgentStatus, ROSTER};
