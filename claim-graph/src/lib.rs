pub mod context;
pub mod error;
pub mod graph;
pub mod runner;
pub mod selector;
pub mod storage;
pub mod task;
pub mod trace;

// Re-export commonly used types
pub use context::Context;
pub use error::{GraphError, Result};
pub use graph::{DoneReason, Edge, ExecutionResult, ExecutionStatus, Graph, GraphBuilder, StepOutcome};
pub use runner::FlowRunner;
pub use selector::{FixedOrderSelector, Selection, StepSelector};
pub use storage::{DEFAULT_MAX_STEPS, InMemorySessionStorage, Session, SessionStorage};
pub use task::{NextAction, Task, TaskResult};
pub use trace::{ExecutionTrace, FINAL_DECISION_KEY, ReasoningStep, ToolInvocation};
