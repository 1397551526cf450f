//! Step selection: decides which task(s) run next.

use crate::{graph::Graph, storage::Session};

/// What a selector wants the graph to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Run these tasks as one batch. The rationale becomes a reasoning step.
    Run { tasks: Vec<String>, rationale: String },
    /// Stop and finalize
    Finish { reason: String },
}

impl Selection {
    pub fn run_one(task: impl Into<String>, rationale: impl Into<String>) -> Self {
        Selection::Run {
            tasks: vec![task.into()],
            rationale: rationale.into(),
        }
    }
}

/// Pluggable decision procedure for the execution loop
pub trait StepSelector: Send + Sync {
    fn select(&self, graph: &Graph, session: &Session) -> Selection;
}

/// Walks a fixed task order. In parallel mode every task whose prerequisites
/// are satisfied runs in the same batch.
#[derive(Debug, Clone)]
pub struct FixedOrderSelector {
    order: Vec<String>,
    parallel: bool,
}

impl FixedOrderSelector {
    pub fn new(order: Vec<String>) -> Self {
        Self {
            order,
            parallel: false,
        }
    }

    /// Uses the graph's insertion order
    pub fn from_graph(graph: &Graph) -> Self {
        Self::new(graph.task_ids().to_vec())
    }

    pub fn parallel(mut self) -> Self {
        self.parallel = true;
        self
    }

    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    fn pending<'a>(&'a self, graph: &'a Graph, session: &'a Session) -> impl Iterator<Item = &'a String> {
        self.order.iter().filter(move |id| {
            !session.is_completed(id) && !session.has_failed(id) && !is_blocked(graph, session, id, 0)
        })
    }
}

impl StepSelector for FixedOrderSelector {
    fn select(&self, graph: &Graph, session: &Session) -> Selection {
        if self.parallel {
            let ready: Vec<String> = self
                .pending(graph, session)
                .filter(|id| graph.is_ready(id, session))
                .cloned()
                .collect();
            if ready.is_empty() {
                return Selection::Finish {
                    reason: "no runnable tasks left".to_string(),
                };
            }
            let rationale = format!("{} task(s) have all prerequisites satisfied", ready.len());
            return Selection::Run {
                tasks: ready,
                rationale,
            };
        }

        match self.pending(graph, session).next() {
            Some(id) => Selection::run_one(id.clone(), format!("next in fixed order: {}", id)),
            None => Selection::Finish {
                reason: "fixed order exhausted".to_string(),
            },
        }
    }
}

// A task is blocked for good once any prerequisite, direct or transitive,
// has failed.
fn is_blocked(graph: &Graph, session: &Session, task_id: &str, depth: usize) -> bool {
    if depth > graph.task_ids().len() {
        return false;
    }
    graph.prerequisites(task_id).iter().any(|p| {
        !session.is_completed(p) && (session.has_failed(p) || is_blocked(graph, session, p, depth + 1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Context, GraphBuilder, NextAction, Task, TaskResult, error::Result};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Noop(&'static str);

    #[async_trait]
    impl Task for Noop {
        fn id(&self) -> &str {
            self.0
        }

        async fn run(&self, _context: Context) -> Result<TaskResult> {
            Ok(TaskResult::new(None, NextAction::Continue))
        }
    }

    fn diamond() -> Graph {
        GraphBuilder::new("diamond")
            .add_task(Arc::new(Noop("root")))
            .add_task(Arc::new(Noop("left")))
            .add_task(Arc::new(Noop("right")))
            .add_task(Arc::new(Noop("join")))
            .add_edge("root", "left")
            .add_edge("root", "right")
            .add_edge("left", "join")
            .add_edge("right", "join")
            .build()
    }

    #[test]
    fn parallel_batches_independent_tasks() {
        let graph = diamond();
        let selector = FixedOrderSelector::from_graph(&graph).parallel();
        let mut session = Session::new("s", "diamond");

        assert_eq!(
            selector.select(&graph, &session),
            Selection::Run {
                tasks: vec!["root".into()],
                rationale: "1 task(s) have all prerequisites satisfied".into(),
            }
        );

        session.mark_completed("root");
        match selector.select(&graph, &session) {
            Selection::Run { tasks, .. } => assert_eq!(tasks, vec!["left", "right"]),
            other => panic!("unexpected selection {:?}", other),
        }
    }

    #[test]
    fn failed_prerequisite_blocks_dependents_transitively() {
        let graph = diamond();
        let selector = FixedOrderSelector::from_graph(&graph);
        let mut session = Session::new("s", "diamond");
        session.mark_completed("root");
        session.mark_failed("left");

        assert_eq!(
            selector.select(&graph, &session),
            Selection::run_one("right", "next in fixed order: right")
        );

        session.mark_completed("right");
        assert!(matches!(selector.select(&graph, &session), Selection::Finish { .. }));
    }
}
