// Claim processing tasks, one per component
pub mod coverage;
pub mod decision;
pub mod documents;
pub mod exclusions;
pub mod extract;
pub mod finalize;
pub mod history;
pub mod payout;
pub mod policy;
pub mod report;

// Shared modules
pub mod types;
pub mod utils;

// Re-export task implementations
pub use coverage::CheckCoverageTask;
pub use decision::MakeDecisionTask;
pub use documents::VerifyDocumentsTask;
pub use exclusions::CheckExclusionsTask;
pub use extract::ExtractClaimTask;
pub use finalize::FinalizeClaimTask;
pub use history::CheckClaimHistoryTask;
pub use payout::CalculatePayoutTask;
pub use policy::RetrievePolicyTask;
pub use report::GenerateReportTask;

// Re-export session keys
pub use types::{session_keys, task_ids};
