pub mod config;
pub mod coverage;
pub mod decision;
pub mod documents;
pub mod error;
pub mod exclusions;
pub mod history;
pub mod model;
pub mod normalizer;
pub mod payout;
pub mod policy;
pub mod report;
pub mod repository;
pub mod tables;
pub mod tasks;
pub mod workflow;

// Re-export commonly used types
pub use config::ProcessingConfig;
pub use error::{ClaimsError, Result};
pub use model::{
    ClaimRecord, ClaimType, CoverageResult, Decision, DecisionOutcome, DocumentStatus, Domain,
    ExclusionEntry, HistoryResult, PayoutResult, PolicyRecord, RawClaim, RiskLevel,
};
pub use workflow::{
    ClaimOrchestrator, ClaimOutcome, ClaimServices, ProcessingSummary, build_claim_graph,
    new_claim_id,
};
