/// Context keys shared by the claim tasks
pub mod session_keys {
    pub const SESSION_ID: &str = "session_id";
    pub const CLAIM_ID: &str = "claim_id";
    pub const STARTED_AT: &str = "started_at";
    pub const RAW_CLAIM: &str = "raw_claim";
    pub const CLAIM: &str = "claim_data";
    pub const POLICY: &str = "policy";
    pub const COVERAGE: &str = "coverage_check";
    pub const EXCLUSIONS: &str = "exclusions";
    pub const DOCUMENTS: &str = "document_status";
    pub const HISTORY: &str = "claim_history";
    pub const PAYOUT: &str = "payout_calculation";
    pub const DECISION: &str = "decision";
    pub const REPORT: &str = "report";
}

/// Task ids as they appear in the graph and the execution trace
pub mod task_ids {
    pub const EXTRACT: &str = "extract_claim_data";
    pub const POLICY: &str = "retrieve_policy";
    pub const COVERAGE: &str = "check_coverage";
    pub const EXCLUSIONS: &str = "check_exclusions";
    pub const DOCUMENTS: &str = "verify_documents";
    pub const HISTORY: &str = "check_claim_history";
    pub const PAYOUT: &str = "calculate_payout";
    pub const DECISION: &str = "make_decision";
    pub const REPORT: &str = "generate_report";
    pub const FINALIZE: &str = "finalize";

    /// Reference order used by the fixed-order selector
    pub const PROCESSING_ORDER: [&str; 9] = [
        EXTRACT, POLICY, COVERAGE, EXCLUSIONS, DOCUMENTS, HISTORY, PAYOUT, DECISION, REPORT,
    ];
}
