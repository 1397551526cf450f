use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::types::{session_keys, task_ids};
use super::utils::{require, session_id, snapshot};
use crate::decision::{DecisionEngine, DecisionInputs};
use crate::model::{CoverageResult, DocumentStatus, ExclusionEntry, HistoryResult, PayoutResult};

pub struct MakeDecisionTask {
    engine: Arc<DecisionEngine>,
}

impl MakeDecisionTask {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Task for MakeDecisionTask {
    fn id(&self) -> &str {
        task_ids::DECISION
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let coverage: CoverageResult = require(&context, session_keys::COVERAGE).await?;
        let exclusions: Vec<ExclusionEntry> = require(&context, session_keys::EXCLUSIONS).await?;
        let payout: PayoutResult = require(&context, session_keys::PAYOUT).await?;
        let documents: DocumentStatus = require(&context, session_keys::DOCUMENTS).await?;
        let history: HistoryResult = require(&context, session_keys::HISTORY).await?;

        let decision = self.engine.decide(DecisionInputs {
            coverage: &coverage,
            exclusions: &exclusions,
            payout: &payout,
            documents: &documents,
            history: &history,
        });

        let sid = session_id(&context).await;

        info!(
            session_id = %sid,
            task_id = %self.id(),
            outcome = %decision.outcome,
            "Decision recorded"
        );
        context.set(session_keys::DECISION, &decision).await;

        Ok(TaskResult::new_with_status(
            Some(format!("{}: {}", decision.outcome, decision.reasoning)),
            NextAction::Continue,
            Some(format!("Decision: {}", decision.outcome)),
        )
        .with_snapshot(
            json!({
                "covered": coverage.covered,
                "exclusions_apply": exclusions.iter().any(|e| e.applies),
                "claim_amount": payout.claimed_amount,
                "documents_complete": documents.complete,
                "fraud_flags": history.fraud_flags,
                "claim_free_years": history.claim_free_years,
                "total_claims": history.total_claims,
            }),
            snapshot(&decision),
        ))
    }
}
