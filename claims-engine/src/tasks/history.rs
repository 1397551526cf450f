use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;

use super::types::{session_keys, task_ids};
use super::utils::{require, snapshot};
use crate::history::HistoryAssessor;
use crate::model::ClaimRecord;

pub struct CheckClaimHistoryTask {
    assessor: Arc<HistoryAssessor>,
}

impl CheckClaimHistoryTask {
    pub fn new(assessor: Arc<HistoryAssessor>) -> Self {
        Self { assessor }
    }
}

#[async_trait]
impl Task for CheckClaimHistoryTask {
    fn id(&self) -> &str {
        task_ids::HISTORY
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;
        let vehicle_reg = claim.vehicle_registration().unwrap_or_default();

        let history = self.assessor.assess(&claim.customer_id, vehicle_reg).await;
        context.set(session_keys::HISTORY, &history).await;

        let response = if history.customer_found {
            format!(
                "{} past claim(s), risk {}",
                history.total_claims, history.risk_level
            )
        } else {
            "No history found".to_string()
        };
        Ok(
            TaskResult::new(Some(response), NextAction::Continue).with_snapshot(
                json!({ "customer_id": claim.customer_id, "vehicle_reg": vehicle_reg }),
                snapshot(&history),
            ),
        )
    }
}
