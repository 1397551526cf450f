use thiserror::Error;

/// Errors raised by the graph engine
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task execution failed: {0}")]
    TaskExecutionFailed(String),

    #[error("Context error: {0}")]
    ContextError(String),

    #[error("Task {task} cannot run before: {}", missing.join(", "))]
    DependencyNotMet { task: String, missing: Vec<String> },

    #[error("Task {0} has already run in this session")]
    AlreadyCompleted(String),

    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, GraphError>;
