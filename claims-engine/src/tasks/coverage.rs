use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;

use super::types::{session_keys, task_ids};
use super::utils::{require, snapshot};
use crate::coverage::CoverageEvaluator;
use crate::model::{ClaimRecord, PolicyRecord};

pub struct CheckCoverageTask {
    evaluator: Arc<CoverageEvaluator>,
}

impl CheckCoverageTask {
    pub fn new(evaluator: Arc<CoverageEvaluator>) -> Self {
        Self { evaluator }
    }
}

#[async_trait]
impl Task for CheckCoverageTask {
    fn id(&self) -> &str {
        task_ids::COVERAGE
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;
        let policy: PolicyRecord = require(&context, session_keys::POLICY).await?;

        let coverage = self.evaluator.evaluate(&claim.claim_type, &policy).await;
        context.set(session_keys::COVERAGE, &coverage).await;

        let response = if coverage.covered {
            format!("Covered: {}", coverage.section)
        } else {
            format!("Not covered: {}", coverage.section)
        };
        Ok(
            TaskResult::new(Some(response), NextAction::Continue).with_snapshot(
                json!({
                    "claim_type": claim.claim_type,
                    "policy_number": policy.policy_number,
                }),
                snapshot(&coverage),
            ),
        )
    }
}
