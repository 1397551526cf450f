use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;

use super::types::{session_keys, task_ids};
use super::utils::{require, snapshot};
use crate::model::{ClaimRecord, PolicyRecord};
use crate::payout::PayoutCalculator;
use crate::report::format_inr;

pub struct CalculatePayoutTask {
    calculator: Arc<PayoutCalculator>,
}

impl CalculatePayoutTask {
    pub fn new(calculator: Arc<PayoutCalculator>) -> Self {
        Self { calculator }
    }
}

#[async_trait]
impl Task for CalculatePayoutTask {
    fn id(&self) -> &str {
        task_ids::PAYOUT
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;
        let policy: PolicyRecord = require(&context, session_keys::POLICY).await?;

        let payout = self.calculator.calculate(
            claim.claim_amount(),
            &policy,
            &claim.claim_type,
            claim.vehicle_age_years(),
        );
        context.set(session_keys::PAYOUT, &payout).await;

        Ok(TaskResult::new(
            Some(format!("Payable {}", format_inr(payout.payable_amount))),
            NextAction::Continue,
        )
        .with_snapshot(
            json!({
                "claim_amount": claim.claim_amount(),
                "claim_type": claim.claim_type,
                "vehicle_age_years": claim.vehicle_age_years(),
            }),
            snapshot(&payout),
        ))
    }
}
