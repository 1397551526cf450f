use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{Context, error::Result, trace::ExecutionTrace};

/// Default safety limit on task invocations per session
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Everything one graph run owns: its context, trace and progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub graph_id: String,
    pub status_message: Option<String>,
    /// Tasks that ran to completion, in completion order
    pub completed: Vec<String>,
    /// Tasks whose last invocation failed
    pub failed: Vec<String>,
    /// Task invocations so far, successful or not
    pub step_count: usize,
    pub max_steps: usize,
    /// Set once the finalizer has run
    pub finished: bool,
    pub trace: ExecutionTrace,
    #[serde(skip)]
    pub context: crate::context::Context,
}

impl Session {
    pub fn new(id: impl Into<String>, graph_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            trace: ExecutionTrace::new(id.clone()),
            id,
            graph_id: graph_id.into(),
            status_message: None,
            completed: Vec::new(),
            failed: Vec::new(),
            step_count: 0,
            max_steps: DEFAULT_MAX_STEPS,
            finished: false,
            context: Context::new(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.completed.iter().any(|t| t == task_id)
    }

    pub fn has_failed(&self, task_id: &str) -> bool {
        self.failed.iter().any(|t| t == task_id)
    }

    pub fn remaining_steps(&self) -> usize {
        self.max_steps.saturating_sub(self.step_count)
    }

    pub(crate) fn mark_completed(&mut self, task_id: &str) {
        self.failed.retain(|t| t != task_id);
        if !self.is_completed(task_id) {
            self.completed.push(task_id.to_string());
        }
    }

    pub(crate) fn mark_failed(&mut self, task_id: &str) {
        if !self.has_failed(task_id) {
            self.failed.push(task_id.to_string());
        }
    }
}

/// Trait for storing and retrieving sessions
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn save(&self, session: Session) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Session>>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory implementation of SessionStorage
pub struct InMemorySessionStorage {
    sessions: Arc<DashMap<String, Session>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for InMemorySessionStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn save(&self, session: Session) -> Result<()> {
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.sessions.get(id).map(|entry| entry.clone()))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.sessions.remove(id);
        Ok(())
    }
}
