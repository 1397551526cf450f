//! Rule cascade producing the final verdict. First matching rule wins.

use tracing::info;

use crate::model::{
    CoverageResult, Decision, DecisionOutcome, DocumentStatus, ExclusionEntry, HistoryResult,
    PayoutResult,
};
use crate::report::format_inr;
use crate::tables::DEFAULT_AUTO_APPROVAL_LIMIT;

/// Past claims above which a clean claim still goes to review
pub const MULTIPLE_CLAIMS_THRESHOLD: usize = 3;

/// Everything the cascade looks at
#[derive(Debug, Clone, Copy)]
pub struct DecisionInputs<'a> {
    pub coverage: &'a CoverageResult,
    pub exclusions: &'a [ExclusionEntry],
    pub payout: &'a PayoutResult,
    pub documents: &'a DocumentStatus,
    pub history: &'a HistoryResult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionEngine {
    auto_approval_limit: f64,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_APPROVAL_LIMIT)
    }
}

impl DecisionEngine {
    pub fn new(auto_approval_limit: f64) -> Self {
        Self {
            auto_approval_limit,
        }
    }

    pub fn auto_approval_limit(&self) -> f64 {
        self.auto_approval_limit
    }

    pub fn decide(&self, inputs: DecisionInputs<'_>) -> Decision {
        let decision = self.cascade(inputs);
        info!(
            outcome = %decision.outcome,
            reasoning = %decision.reasoning,
            "Made decision"
        );
        decision
    }

    fn cascade(&self, inputs: DecisionInputs<'_>) -> Decision {
        let DecisionInputs {
            coverage,
            exclusions,
            payout,
            documents,
            history,
        } = inputs;

        if !coverage.covered {
            return Decision::new(
                DecisionOutcome::Denied,
                "Claim type not covered under policy",
            );
        }

        let applicable: Vec<&str> = exclusions
            .iter()
            .filter(|e| e.applies)
            .map(|e| e.name.as_str())
            .collect();
        if !applicable.is_empty() {
            return Decision::new(
                DecisionOutcome::Denied,
                format!("Policy exclusions apply: {}", applicable.join(", ")),
            );
        }

        if !history.fraud_flags.is_empty() {
            return Decision::new(
                DecisionOutcome::Denied,
                format!(
                    "Fraud indicators detected: {}",
                    history.fraud_flags.join(", ")
                ),
            );
        }

        let amount = payout.claimed_amount;
        let limit = format_inr(self.auto_approval_limit);

        if amount <= self.auto_approval_limit
            && documents.complete
            && history.claim_free_years >= 1
        {
            return Decision::new(
                DecisionOutcome::Approved,
                format!("Auto-approved: Amount within limit ({limit}), all criteria met"),
            );
        }

        if amount > self.auto_approval_limit {
            return Decision::new(
                DecisionOutcome::Review,
                format!("Manual review required: Amount exceeds auto-approval limit ({limit})"),
            );
        }

        if !documents.complete {
            return Decision::new(
                DecisionOutcome::Approved,
                format!(
                    "Conditionally approved pending {} document(s)",
                    documents.missing.len()
                ),
            );
        }

        if history.total_claims > MULTIPLE_CLAIMS_THRESHOLD {
            return Decision::new(
                DecisionOutcome::Review,
                "Manual review required: Multiple past claims",
            );
        }

        Decision::new(DecisionOutcome::Approved, "All checks passed, claim approved")
    }
}
