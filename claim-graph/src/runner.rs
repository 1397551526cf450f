//! FlowRunner – loads a session, drives the graph with a selector and persists
//! the updated session back to storage.
//!
//! Use [`FlowRunner::run`] to process a session to completion, or
//! [`FlowRunner::step`] to advance it one selector decision at a time (useful
//! when a caller wants to inspect the session between steps). Callers that
//! need custom persistence can use `Graph::execute_session` directly.

use std::sync::Arc;

use crate::{
    error::{GraphError, Result},
    graph::{ExecutionResult, ExecutionStatus, Graph, StepOutcome},
    selector::StepSelector,
    storage::{Session, SessionStorage},
};

/// High-level helper that orchestrates the common _load → execute → save_ pattern.
#[derive(Clone)]
pub struct FlowRunner {
    graph: Arc<Graph>,
    selector: Arc<dyn StepSelector>,
    storage: Arc<dyn SessionStorage>,
}

impl FlowRunner {
    pub fn new(
        graph: Arc<Graph>,
        selector: Arc<dyn StepSelector>,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            graph,
            selector,
            storage,
        }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Run the session until it is finalized, then save it.
    pub async fn run(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self.load(session_id).await?;
        let result = self
            .graph
            .execute_session(&mut session, self.selector.as_ref())
            .await;
        self.storage.save(session).await?;
        Ok(result)
    }

    /// Advance the session by one selector decision. Finalizes when that
    /// decision ends the run.
    pub async fn step(&self, session_id: &str) -> Result<ExecutionResult> {
        let mut session = self.load(session_id).await?;
        let result = match self.graph.step(&mut session, self.selector.as_ref()).await {
            StepOutcome::Continue => ExecutionResult {
                response: session.status_message.clone(),
                status: ExecutionStatus::Running,
            },
            StepOutcome::Done(reason) => self.graph.finalize(&mut session, reason).await,
        };
        self.storage.save(session).await?;
        Ok(result)
    }

    async fn load(&self, session_id: &str) -> Result<Session> {
        self.storage
            .get(session_id)
            .await?
            .ok_or_else(|| GraphError::SessionNotFound(session_id.to_string()))
    }
}
