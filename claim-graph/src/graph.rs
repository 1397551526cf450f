use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::{
    context::Context,
    error::{GraphError, Result},
    selector::{Selection, StepSelector},
    storage::Session,
    task::{NextAction, Task, TaskResult},
    trace::FINAL_DECISION_KEY,
};

/// Prerequisite edge: `to` may only run once `from` has completed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// A graph of tasks and the prerequisites between them
pub struct Graph {
    pub id: String,
    tasks: DashMap<String, Arc<dyn Task>>,
    order: Vec<String>,
    edges: Vec<Edge>,
    finalizer: Option<Arc<dyn Task>>,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: DashMap::new(),
            order: Vec::new(),
            edges: Vec::new(),
            finalizer: None,
        }
    }

    /// Task ids in the order they were added
    pub fn task_ids(&self) -> &[String] {
        &self.order
    }

    pub fn get_task(&self, task_id: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(task_id).map(|entry| entry.clone())
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Direct prerequisites of `task_id`
    pub fn prerequisites(&self, task_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|edge| edge.to == task_id)
            .map(|edge| edge.from.clone())
            .collect()
    }

    /// Prerequisites of `task_id` that have not completed in `session`
    pub fn unmet_prerequisites(&self, task_id: &str, session: &Session) -> Vec<String> {
        self.prerequisites(task_id)
            .into_iter()
            .filter(|p| !session.is_completed(p))
            .collect()
    }

    /// A task is ready when it exists, has not completed and all of its
    /// prerequisites have.
    pub fn is_ready(&self, task_id: &str, session: &Session) -> bool {
        self.contains_task(task_id)
            && !session.is_completed(task_id)
            && self.unmet_prerequisites(task_id, session).is_empty()
    }

    /// Run the selector/execute loop until the selector is done, a task ends
    /// the flow or the step limit is hit, then finalize.
    pub async fn execute_session(
        &self,
        session: &mut Session,
        selector: &dyn StepSelector,
    ) -> ExecutionResult {
        loop {
            match self.step(session, selector).await {
                StepOutcome::Continue => continue,
                StepOutcome::Done(reason) => {
                    return self.finalize(session, reason).await;
                }
            }
        }
    }

    /// One decide/execute cycle. Does not finalize.
    pub async fn step(&self, session: &mut Session, selector: &dyn StepSelector) -> StepOutcome {
        if session.finished {
            return StepOutcome::Done(DoneReason::AlreadyFinished);
        }

        if session.remaining_steps() == 0 {
            warn!(
                session_id = %session.id,
                step_count = session.step_count,
                max_steps = session.max_steps,
                "Step limit reached, forcing finalization"
            );
            return StepOutcome::Done(DoneReason::StepLimit);
        }

        let (mut tasks, rationale) = match selector.select(self, session) {
            Selection::Finish { reason } => {
                info!(session_id = %session.id, reason = %reason, "Selector finished");
                return StepOutcome::Done(DoneReason::SelectorFinished(reason));
            }
            Selection::Run { tasks, rationale } => (tasks, rationale),
        };

        tasks.truncate(session.remaining_steps());
        if tasks.is_empty() {
            return StepOutcome::Done(DoneReason::SelectorFinished(
                "selector returned no tasks".to_string(),
            ));
        }

        session
            .trace
            .record_reasoning(rationale, format!("run {}", tasks.join(", ")));

        let results = self.execute_batch(&tasks, session).await;

        let observation = results
            .iter()
            .filter_map(|r| r.response.clone())
            .collect::<Vec<_>>()
            .join(" | ");
        session.trace.observe(observation);

        if let Some(last) = results.iter().rev().find_map(|r| r.status_message.clone()) {
            session.status_message = Some(last);
        }

        match results.iter().find(|r| r.next_action == NextAction::End) {
            Some(ended) => StepOutcome::Done(DoneReason::Ended(ended.task_id.clone())),
            None => StepOutcome::Continue,
        }
    }

    /// Executes `task_ids` concurrently against the session. Every id costs a
    /// step whether it runs or not. A task runs at most once per session.
    async fn execute_batch(&self, task_ids: &[String], session: &mut Session) -> Vec<TaskResult> {
        let mut handles = Vec::with_capacity(task_ids.len());

        for task_id in task_ids {
            session.step_count += 1;

            let task = match self.get_task(task_id) {
                Some(task) => task,
                None => {
                    let err = GraphError::TaskNotFound(task_id.clone());
                    error!(session_id = %session.id, task_id = %task_id, "{}", err);
                    session.trace.record_failure(task_id, 0.0, err.to_string());
                    continue;
                }
            };

            let already_ran = session.is_completed(task_id)
                || handles.iter().any(|(scheduled, _, _)| scheduled == task_id);
            if already_ran {
                let err = GraphError::AlreadyCompleted(task_id.clone());
                warn!(session_id = %session.id, task_id = %task_id, "{}", err);
                session.trace.record_failure(task_id, 0.0, err.to_string());
                continue;
            }

            let missing = self.unmet_prerequisites(task_id, session);
            if !missing.is_empty() {
                let err = GraphError::DependencyNotMet {
                    task: task_id.clone(),
                    missing,
                };
                warn!(session_id = %session.id, task_id = %task_id, "{}", err);
                session.trace.record_failure(task_id, 0.0, err.to_string());
                session.mark_failed(task_id);
                continue;
            }

            info!(
                session_id = %session.id,
                task_id = %task_id,
                step = session.step_count,
                "Executing task"
            );
            let context = session.context.clone();
            let started = Instant::now();
            let handle = tokio::spawn(async move { task.run(context).await });
            handles.push((task_id.clone(), started, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (task_id, started, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(GraphError::TaskExecutionFailed(format!(
                    "task panicked or was cancelled: {}",
                    join_err
                ))),
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(mut result) => {
                    result.task_id = task_id.clone();
                    session.trace.record_success(
                        &task_id,
                        result.input.clone(),
                        result.output.as_ref(),
                        duration_ms,
                    );
                    session.mark_completed(&task_id);
                    info!(
                        session_id = %session.id,
                        task_id = %task_id,
                        duration_ms = duration_ms,
                        "Task completed"
                    );
                    results.push(result);
                }
                Err(e) => {
                    error!(session_id = %session.id, task_id = %task_id, error = %e, "Task failed");
                    session.trace.record_failure(&task_id, duration_ms, e.to_string());
                    session.mark_failed(&task_id);
                }
            }
        }

        results
    }

    /// Runs the finalizer (outside the step budget) and seals the trace
    pub async fn finalize(&self, session: &mut Session, reason: DoneReason) -> ExecutionResult {
        if matches!(reason, DoneReason::AlreadyFinished) {
            return ExecutionResult {
                response: None,
                status: ExecutionStatus::Completed,
            };
        }

        let mut response = None;
        if let Some(finalizer) = &self.finalizer {
            let finalizer_id = finalizer.id().to_string();
            let started = Instant::now();
            let task = finalizer.clone();
            let context = session.context.clone();
            let outcome = match tokio::spawn(async move { task.run(context).await }).await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(GraphError::TaskExecutionFailed(format!(
                    "finalizer panicked or was cancelled: {}",
                    join_err
                ))),
            };
            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

            match outcome {
                Ok(result) => {
                    session.trace.record_success(
                        &finalizer_id,
                        result.input.clone(),
                        result.output.as_ref(),
                        duration_ms,
                    );
                    if result.status_message.is_some() {
                        session.status_message = result.status_message.clone();
                    }
                    response = result.response;
                }
                Err(e) => {
                    error!(session_id = %session.id, error = %e, "Finalizer failed");
                    session.trace.record_failure(&finalizer_id, duration_ms, e.to_string());
                }
            }
        }

        let final_decision: Option<String> = session.context.get_sync(FINAL_DECISION_KEY);
        session.trace.seal(final_decision);
        session.finished = true;

        info!(
            session_id = %session.id,
            steps = session.step_count,
            reason = ?reason,
            "Session finalized"
        );

        ExecutionResult {
            response,
            status: match reason {
                DoneReason::StepLimit => ExecutionStatus::StepLimitReached,
                _ => ExecutionStatus::Completed,
            },
        }
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let task_id = task.id().to_string();
        if self.graph.tasks.insert(task_id.clone(), task).is_none() {
            self.graph.order.push(task_id);
        }
        self
    }

    /// `to` depends on `from`
    pub fn add_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        let edge = Edge {
            from: from.into(),
            to: to.into(),
        };
        if !self.graph.edges.contains(&edge) {
            self.graph.edges.push(edge);
        }
        self
    }

    /// Task that always runs once the loop stops, even after the step limit
    pub fn set_finalizer(mut self, task: Arc<dyn Task>) -> Self {
        self.graph.finalizer = Some(task);
        self
    }

    /// Fails when an edge names an unknown task or the edges form a cycle
    pub fn try_build(self) -> Result<Graph> {
        for edge in &self.graph.edges {
            for id in [&edge.from, &edge.to] {
                if !self.graph.contains_task(id) {
                    return Err(GraphError::TaskNotFound(id.clone()));
                }
            }
        }
        if let Some(task) = self.find_cycle() {
            return Err(GraphError::InvalidGraph(format!(
                "dependency cycle through {}",
                task
            )));
        }
        Ok(self.graph)
    }

    pub fn build(self) -> Graph {
        self.graph
    }

    // Kahn's algorithm; returns a task left over when no topological order exists
    fn find_cycle(&self) -> Option<String> {
        let mut remaining: Vec<&String> = self.graph.order.iter().collect();
        let mut done: Vec<&String> = Vec::new();
        loop {
            let before = remaining.len();
            remaining.retain(|id| {
                let blocked = self
                    .graph
                    .edges
                    .iter()
                    .any(|e| &e.to == *id && !done.contains(&&e.from));
                if !blocked {
                    done.push(*id);
                }
                blocked
            });
            if remaining.is_empty() {
                return None;
            }
            if remaining.len() == before {
                return remaining.first().map(|id| (*id).clone());
            }
        }
    }
}

/// Result of one decide/execute cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Done(DoneReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoneReason {
    SelectorFinished(String),
    Ended(String),
    StepLimit,
    AlreadyFinished,
}

/// Status of graph execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub response: Option<String>,
    pub status: ExecutionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// More steps remain
    Running,
    /// The run finished and was finalized
    Completed,
    /// The step limit cut the run short; the finalizer still ran
    StepLimitReached,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedOrderSelector, TaskResult};
    use async_trait::async_trait;

    struct Named(&'static str);

    #[async_trait]
    impl Task for Named {
        fn id(&self) -> &str {
            self.0
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            context.set(self.0, true).await;
            Ok(TaskResult::new(Some(format!("{} done", self.0)), NextAction::Continue))
        }
    }

    struct Panics;

    #[async_trait]
    impl Task for Panics {
        fn id(&self) -> &str {
            "panics"
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            panic!("component blew up");
        }
    }

    struct Finalizer;

    #[async_trait]
    impl Task for Finalizer {
        fn id(&self) -> &str {
            "finalize"
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            context.set(FINAL_DECISION_KEY, "DONE").await;
            Ok(TaskResult::new(Some("final".into()), NextAction::End))
        }
    }

    fn chain() -> Graph {
        GraphBuilder::new("chain")
            .add_task(Arc::new(Named("a")))
            .add_task(Arc::new(Named("b")))
            .add_task(Arc::new(Named("c")))
            .add_edge("a", "b")
            .add_edge("b", "c")
            .set_finalizer(Arc::new(Finalizer))
            .build()
    }

    #[tokio::test]
    async fn runs_chain_in_order_and_seals_trace() {
        let graph = chain();
        let mut session = Session::new("s1", "chain");
        let selector = FixedOrderSelector::from_graph(&graph);

        let result = graph.execute_session(&mut session, &selector).await;

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.response.as_deref(), Some("final"));
        assert_eq!(session.completed, vec!["a", "b", "c"]);
        assert_eq!(session.step_count, 3);
        assert_eq!(session.trace.tool_invocations.len(), 4);
        assert_eq!(session.trace.final_decision.as_deref(), Some("DONE"));
        assert!(session.finished);
    }

    #[tokio::test]
    async fn out_of_order_selection_is_rejected() {
        let graph = chain();
        let mut session = Session::new("s1", "chain");
        let selector = FixedOrderSelector::new(vec!["c".into(), "a".into()]);

        graph.execute_session(&mut session, &selector).await;

        let first = &session.trace.tool_invocations[0];
        assert_eq!(first.tool_name, "c");
        assert!(!first.success);
        assert!(first.error.as_deref().unwrap_or_default().contains("b"));
        assert!(session.is_completed("a"));
        assert!(!session.is_completed("c"));
    }

    #[tokio::test]
    async fn panicking_task_is_recorded_not_propagated() {
        let graph = GraphBuilder::new("p")
            .add_task(Arc::new(Panics))
            .add_task(Arc::new(Named("after")))
            .set_finalizer(Arc::new(Finalizer))
            .build();
        let mut session = Session::new("s1", "p");
        let selector = FixedOrderSelector::from_graph(&graph);

        let result = graph.execute_session(&mut session, &selector).await;

        assert_eq!(result.status, ExecutionStatus::Completed);
        assert!(session.has_failed("panics"));
        assert!(session.is_completed("after"));
        assert!(!session.trace.tool_invocations[0].success);
    }

    struct Counted {
        id: &'static str,
        runs: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[async_trait]
    impl Task for Counted {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, context: Context) -> Result<TaskResult> {
            let run = self.runs.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            context.set(self.id, run).await;
            Ok(TaskResult::new(None, NextAction::Continue))
        }
    }

    /// Asks for the same batch every time
    struct Again(Vec<&'static str>);

    impl StepSelector for Again {
        fn select(&self, _graph: &Graph, _session: &Session) -> Selection {
            Selection::Run {
                tasks: self.0.iter().map(|t| t.to_string()).collect(),
                rationale: "once more".into(),
            }
        }
    }

    #[tokio::test]
    async fn completed_task_is_not_run_again() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let graph = GraphBuilder::new("once")
            .add_task(Arc::new(Counted {
                id: "decide",
                runs: runs.clone(),
            }))
            .set_finalizer(Arc::new(Finalizer))
            .build();
        let mut session = Session::new("s1", "once").with_max_steps(3);

        let result = graph.execute_session(&mut session, &Again(vec!["decide"])).await;

        assert_eq!(result.status, ExecutionStatus::StepLimitReached);
        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(session.context.get::<usize>("decide").await, Some(1));
        assert_eq!(session.step_count, 3);
        let invocations = &session.trace.tool_invocations;
        assert!(invocations[0].success);
        for repeat in &invocations[1..3] {
            assert!(!repeat.success);
            assert_eq!(
                repeat.error.as_deref(),
                Some("Task decide has already run in this session")
            );
        }
        assert!(session.is_completed("decide"));
        assert!(!session.has_failed("decide"));
    }

    #[tokio::test]
    async fn duplicate_ids_in_one_batch_run_once() {
        let runs = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let graph = GraphBuilder::new("dup")
            .add_task(Arc::new(Counted {
                id: "decide",
                runs: runs.clone(),
            }))
            .build();
        let mut session = Session::new("s1", "dup").with_max_steps(2);

        graph
            .execute_session(&mut session, &Again(vec!["decide", "decide"]))
            .await;

        assert_eq!(runs.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(session.step_count, 2);
        assert_eq!(session.trace.tool_invocations.len(), 2);
    }

    #[test]
    fn try_build_rejects_cycles_and_unknown_tasks() {
        let cyclic = GraphBuilder::new("cycle")
            .add_task(Arc::new(Named("a")))
            .add_task(Arc::new(Named("b")))
            .add_edge("a", "b")
            .add_edge("b", "a")
            .try_build();
        assert!(cyclic.is_err());

        let unknown = GraphBuilder::new("unknown")
            .add_task(Arc::new(Named("a")))
            .add_edge("a", "ghost")
            .try_build();
        assert!(matches!(unknown, Err(GraphError::TaskNotFound(id)) if id == "ghost"));

        assert!(
            GraphBuilder::new("ok")
                .add_task(Arc::new(Named("a")))
                .add_task(Arc::new(Named("b")))
                .add_edge("a", "b")
                .try_build()
                .is_ok()
        );
    }
}
