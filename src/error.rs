use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    #[error("Agent {agent} is busy with task {task}")]
    AgentBusy { agent: String, task: String },

    #[error("Unknown dependency task: {0}")]
    UnknownDependencyTask(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task id: {0}")]
    InvalidTaskId(String),

    #[error("State file not found or corrupt: {reason}")]
    StateFile {
        reason: String,
        /// Snapshot ids that do exist, offered as a remediation hint.
        available: Vec<String>,
    },

    #[error("Workspace creation failed: {0}")]
    WorkspaceCreationFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
