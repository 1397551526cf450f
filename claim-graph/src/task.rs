use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{context::Context, error::Result};

/// Result of a task execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// Short human-readable summary of what the task produced
    pub response: Option<String>,
    /// Next action to take
    pub next_action: NextAction,
    /// Status line kept on the session for observers
    pub status_message: Option<String>,
    /// Id of the task that produced this result, filled in by the graph
    #[serde(default)]
    pub task_id: String,
    /// Inputs the task consumed, recorded in the execution trace
    #[serde(default)]
    pub input: Option<Value>,
    /// Output the task stored, recorded (truncated) in the execution trace
    #[serde(default)]
    pub output: Option<Value>,
}

impl TaskResult {
    pub fn new(response: Option<String>, next_action: NextAction) -> Self {
        Self {
            response,
            next_action,
            status_message: None,
            task_id: String::new(),
            input: None,
            output: None,
        }
    }

    pub fn new_with_status(
        response: Option<String>,
        next_action: NextAction,
        status_message: Option<String>,
    ) -> Self {
        Self {
            status_message,
            ..Self::new(response, next_action)
        }
    }

    /// Attach input/output snapshots for the audit trace
    pub fn with_snapshot(mut self, input: Value, output: Value) -> Self {
        self.input = Some(input);
        self.output = Some(output);
        self
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    /// Hand control back to the selector for the next step
    Continue,
    /// Stop selecting tasks and go straight to finalization
    End,
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// Unique identifier for this task
    fn id(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Execute the task with the given context
    async fn run(&self, context: Context) -> Result<TaskResult>;
}
