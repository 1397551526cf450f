use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use super::types::{session_keys, task_ids};
use super::utils::{require, session_id, snapshot};
use crate::model::ClaimRecord;
use crate::policy::PolicyResolver;

pub struct RetrievePolicyTask {
    resolver: Arc<PolicyResolver>,
}

impl RetrievePolicyTask {
    pub fn new(resolver: Arc<PolicyResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Task for RetrievePolicyTask {
    fn id(&self) -> &str {
        task_ids::POLICY
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;
        let identifier = claim.policy_identifier();
        let policy = self.resolver.resolve(&identifier).await;

        let sid = session_id(&context).await;

        info!(
            session_id = %sid,
            task_id = %self.id(),
            policy_number = %policy.policy_number,
            provenance = ?policy.provenance,
            "Policy retrieved"
        );

        context.set(session_keys::POLICY, &policy).await;

        let response = if policy.is_fallback() {
            format!("Policy {} (fallback)", policy.policy_number)
        } else {
            format!("Policy {}", policy.policy_number)
        };
        Ok(
            TaskResult::new(Some(response), NextAction::Continue)
                .with_snapshot(json!({ "identifier": identifier }), snapshot(&policy)),
        )
    }
}
