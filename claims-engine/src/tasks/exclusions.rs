use async_trait::async_trait;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;
use std::sync::Arc;

use super::types::{session_keys, task_ids};
use super::utils::{require, snapshot};
use crate::exclusions::ExclusionScreener;
use crate::model::{ClaimRecord, PolicyRecord};

pub struct CheckExclusionsTask {
    screener: Arc<ExclusionScreener>,
}

impl CheckExclusionsTask {
    pub fn new(screener: Arc<ExclusionScreener>) -> Self {
        Self { screener }
    }
}

#[async_trait]
impl Task for CheckExclusionsTask {
    fn id(&self) -> &str {
        task_ids::EXCLUSIONS
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let claim: ClaimRecord = require(&context, session_keys::CLAIM).await?;
        let policy: PolicyRecord = require(&context, session_keys::POLICY).await?;

        let exclusions = self.screener.screen(&claim, &policy);
        context.set(session_keys::EXCLUSIONS, &exclusions).await;

        let applicable = exclusions.iter().filter(|e| e.applies).count();
        Ok(TaskResult::new(
            Some(format!("{applicable} exclusion(s) apply")),
            NextAction::Continue,
        )
        .with_snapshot(
            json!({ "claim_type": claim.claim_type, "policy_number": policy.policy_number }),
            snapshot(&exclusions),
        ))
    }
}
