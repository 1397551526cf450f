use async_trait::async_trait;
use chrono::Local;
use claim_graph::{Context, NextAction, Result, Task, TaskResult};
use serde_json::json;

use super::types::{session_keys, task_ids};
use super::utils::{elapsed, require};
use crate::model::{
    ClaimRecord, CoverageResult, Decision, DocumentStatus, ExclusionEntry, HistoryResult,
    PayoutResult,
};
use crate::report::{ReportInput, generate};

/// Renders the report from whatever the context holds. Only the decision is
/// mandatory.
pub async fn render_from_context(context: &Context, decision: &Decision) -> String {
    let claim_id: String = context
        .get(session_keys::CLAIM_ID)
        .await
        .unwrap_or_default();
    let claim: Option<ClaimRecord> = context.get(session_keys::CLAIM).await;
    let coverage: Option<CoverageResult> = context.get(session_keys::COVERAGE).await;
    let exclusions: Option<Vec<ExclusionEntry>> = context.get(session_keys::EXCLUSIONS).await;
    let payout: Option<PayoutResult> = context.get(session_keys::PAYOUT).await;
    let documents: Option<DocumentStatus> = context.get(session_keys::DOCUMENTS).await;
    let history: Option<HistoryResult> = context.get(session_keys::HISTORY).await;

    generate(&ReportInput {
        claim_id: &claim_id,
        processed_at: Local::now().naive_local(),
        claim: claim.as_ref(),
        coverage: coverage.as_ref(),
        exclusions: exclusions.as_deref(),
        payout: payout.as_ref(),
        documents: documents.as_ref(),
        history: history.as_ref(),
        decision,
        processing_time: elapsed(context).await,
    })
}

/// Last task of a complete run
pub struct GenerateReportTask;

#[async_trait]
impl Task for GenerateReportTask {
    fn id(&self) -> &str {
        task_ids::REPORT
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let decision: Decision = require(&context, session_keys::DECISION).await?;
        let report = render_from_context(&context, &decision).await;
        context.set(session_keys::REPORT, &report).await;

        Ok(TaskResult::new_with_status(
            Some(format!("Report generated: {}", decision.outcome)),
            NextAction::End,
            Some("Report generated".to_string()),
        )
        .with_snapshot(json!({ "decision": decision.outcome }), json!(report)))
    }
}
