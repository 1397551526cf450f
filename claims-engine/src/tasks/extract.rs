use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::types::{session_keys, task_ids};
use super::utils::{require, session_id, snapshot};
use crate::model::RawClaim;
use crate::normalizer::normalize;

/// Normalizes the raw claim into a typed `ClaimRecord`
pub struct ExtractClaimTask;

#[async_trait]
impl Task for ExtractClaimTask {
    fn id(&self) -> &str {
        task_ids::EXTRACT
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let raw: RawClaim = require(&context, session_keys::RAW_CLAIM).await?;
        let claim = normalize(&raw);

        let sid = session_id(&context).await;

        info!(
            session_id = %sid,
            task_id = %self.id(),
            claim_type = %claim.claim_type,
            amount = claim.claim_amount(),
            "Claim data extracted"
        );

        context.set(session_keys::CLAIM, &claim).await;

        Ok(TaskResult::new_with_status(
            Some(format!("Claim type: {}", claim.claim_type)),
            NextAction::Continue,
            Some("Claim data extracted".to_string()),
        )
        .with_snapshot(snapshot(&raw), snapshot(&claim)))
    }
}
