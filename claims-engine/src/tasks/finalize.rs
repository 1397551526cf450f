use async_trait::async_trait;
use claim_graph::{Context, FINAL_DECISION_KEY, NextAction, Result, Task, TaskResult};
use serde_json::json;
use tracing::{info, warn};

use super::report::render_from_context;
use super::types::{session_keys, task_ids};
use super::utils::{session_id, snapshot};
use crate::model::{CoverageResult, Decision, DecisionOutcome};

pub const INCOMPLETE_REASONING: &str =
    "Claim requires manual review - automated processing incomplete";
pub const NOT_COVERED_REASONING: &str = "Claim type not covered under policy";

/// Decision used when the pipeline stopped before the decision engine ran
pub fn default_decision(coverage: Option<&CoverageResult>) -> Decision {
    match coverage {
        Some(c) if !c.covered => Decision::new(DecisionOutcome::Denied, NOT_COVERED_REASONING),
        _ => Decision::new(DecisionOutcome::Review, INCOMPLETE_REASONING),
    }
}

/// Runs once at the end of every claim. Fills in a decision and a report if
/// the pipeline did not produce them and publishes the final decision.
pub struct FinalizeClaimTask;

#[async_trait]
impl Task for FinalizeClaimTask {
    fn id(&self) -> &str {
        task_ids::FINALIZE
    }

    async fn run(&self, context: Context) -> Result<TaskResult> {
        let session_id = session_id(&context).await;

        let decision = match context.get::<Decision>(session_keys::DECISION).await {
            Some(decision) => decision,
            None => {
                let coverage: Option<CoverageResult> = context.get(session_keys::COVERAGE).await;
                let decision = default_decision(coverage.as_ref());
                warn!(
                    session_id = %session_id,
                    outcome = %decision.outcome,
                    "No decision reached, applying default"
                );
                context.set(session_keys::DECISION, &decision).await;
                decision
            }
        };

        let existing = if context.is_populated(session_keys::REPORT) {
            context.get::<String>(session_keys::REPORT).await
        } else {
            None
        };
        let report = match existing {
            Some(report) => report,
            None => {
                info!(session_id = %session_id, "Synthesizing report from partial results");
                let report = render_from_context(&context, &decision).await;
                context.set(session_keys::REPORT, &report).await;
                report
            }
        };

        context
            .set(FINAL_DECISION_KEY, decision.outcome.as_str())
            .await;

        Ok(TaskResult::new_with_status(
            Some(report),
            NextAction::End,
            Some(format!("Final decision: {}", decision.outcome)),
        )
        .with_snapshot(json!({}), snapshot(&decision)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CoverageLimit, CoverageSource};

    #[tokio::test]
    async fn empty_context_finalizes_to_review_with_report() {
        let context = Context::new();
        context.set(session_keys::CLAIM_ID, "CLM-20240601-DEADBEEF").await;

        let result = FinalizeClaimTask.run(context.clone()).await.unwrap();

        let decision: Decision = context.get(session_keys::DECISION).await.unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Review);
        assert_eq!(decision.reasoning, INCOMPLETE_REASONING);
        assert_eq!(
            context.get::<String>(FINAL_DECISION_KEY).await.as_deref(),
            Some("REVIEW")
        );
        let report = result.response.unwrap();
        assert!(report.contains("Claim ID: CLM-20240601-DEADBEEF"));
        assert!(report.contains("DECISION: REVIEW"));
    }

    #[tokio::test]
    async fn uncovered_claim_without_decision_is_denied() {
        let context = Context::new();
        let coverage = CoverageResult {
            covered: false,
            section: "Unknown Coverage".into(),
            coverage_limit: CoverageLimit::Amount(0.0),
            source: CoverageSource::EmbeddedRules,
        };
        context.set(session_keys::COVERAGE, &coverage).await;

        FinalizeClaimTask.run(context.clone()).await.unwrap();

        let decision: Decision = context.get(session_keys::DECISION).await.unwrap();
        assert_eq!(decision.outcome, DecisionOutcome::Denied);
    }

    #[tokio::test]
    async fn existing_decision_and_report_are_kept() {
        let context = Context::new();
        let decision = Decision::new(DecisionOutcome::Approved, "All checks passed, claim approved");
        context.set(session_keys::DECISION, &decision).await;
        context.set(session_keys::REPORT, "final report").await;

        let result = FinalizeClaimTask.run(context.clone()).await.unwrap();

        assert_eq!(result.response.as_deref(), Some("final report"));
        assert_eq!(
            context.get::<String>(FINAL_DECISION_KEY).await.as_deref(),
            Some("APPROVED")
        );
    }

    #[tokio::test]
    async fn blank_report_is_regenerated() {
        let context = Context::new();
        context.set(session_keys::CLAIM_ID, "CLM-20240601-0BADF00D").await;
        context.set(session_keys::REPORT, "").await;

        let result = FinalizeClaimTask.run(context.clone()).await.unwrap();

        let report = result.response.unwrap();
        assert!(report.contains("Claim ID: CLM-20240601-0BADF00D"));
        assert_eq!(
            context.get::<String>(session_keys::REPORT).await.as_deref(),
            Some(report.as_str())
        );
    }
}
