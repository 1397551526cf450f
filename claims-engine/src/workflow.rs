//! Claim workflow: builds the processing graph from the domain services and
//! drives one session per claim.

use chrono::Utc;
use claim_graph::{
    ExecutionResult, ExecutionStatus, ExecutionTrace, FixedOrderSelector, FlowRunner, Graph,
    GraphBuilder, InMemorySessionStorage, Session, SessionStorage, StepSelector,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::ProcessingConfig;
use crate::coverage::{CoverageEvaluator, HttpCoverageService};
use crate::decision::DecisionEngine;
use crate::documents::DocumentVerifier;
use crate::error::Result;
use crate::exclusions::ExclusionScreener;
use crate::history::{FlatTableHistoryLookup, HistoryAssessor, RepositoryHistoryLookup};
use crate::model::{Decision, RawClaim};
use crate::payout::PayoutCalculator;
use crate::policy::{InMemoryPolicyContext, PolicyResolver, RepositoryPolicyLookup};
use crate::report::fallback_report;
use crate::repository::{FlatHistoryTable, InMemoryClaimsRepository};
use crate::tables::RuleTables;
use crate::tasks::finalize::default_decision;
use crate::tasks::{
    CalculatePayoutTask, CheckClaimHistoryTask, CheckCoverageTask, CheckExclusionsTask,
    ExtractClaimTask, FinalizeClaimTask, GenerateReportTask, MakeDecisionTask,
    RetrievePolicyTask, VerifyDocumentsTask, session_keys, task_ids,
};

pub const CLAIM_GRAPH_ID: &str = "claim_processing";

/// `CLM-YYYYMMDD-XXXXXXXX`
pub fn new_claim_id() -> String {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(8)
        .collect();
    format!(
        "CLM-{}-{}",
        Utc::now().format("%Y%m%d"),
        suffix.to_uppercase()
    )
}

/// The domain components one orchestrator runs with
pub struct ClaimServices {
    pub policy: Arc<PolicyResolver>,
    pub coverage: Arc<CoverageEvaluator>,
    pub exclusions: Arc<ExclusionScreener>,
    pub documents: Arc<DocumentVerifier>,
    pub history: Arc<HistoryAssessor>,
    pub payout: Arc<PayoutCalculator>,
    pub decision: Arc<DecisionEngine>,
}

impl ClaimServices {
    /// Loads tables and seed data from `data_dir` when set and connects the
    /// remote coverage service when a URL is configured.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        let (tables, repository, flat_history, policy_context) = match &config.data_dir {
            Some(dir) => load_data(dir),
            None => {
                info!("No data directory configured, using built-in tables");
                (
                    RuleTables::default(),
                    InMemoryClaimsRepository::new(),
                    FlatHistoryTable::default(),
                    InMemoryPolicyContext::default(),
                )
            }
        };

        let coverage = match &config.coverage_service_url {
            Some(url) => {
                info!(url = %url, "Using remote coverage rules service");
                let service = HttpCoverageService::new(url.clone(), config.remote_timeout)?;
                CoverageEvaluator::with_service(Arc::new(service), config.remote_timeout)
            }
            None => CoverageEvaluator::embedded(),
        };

        let repository = Arc::new(repository);
        let mut services = Self::with_repository(
            repository.clone(),
            flat_history,
            tables,
            config.lookup_timeout,
        );
        services.coverage = Arc::new(coverage);
        if !policy_context.is_empty() {
            info!("Enriching policies from policy documents");
            services.policy = Arc::new(
                policy_resolver(repository, config.lookup_timeout)
                    .with_context(Arc::new(policy_context)),
            );
        }
        if let Some(limit) = config.auto_approval_limit {
            services.decision = Arc::new(DecisionEngine::new(limit));
        }
        Ok(services)
    }

    /// Services over an in-memory repository with embedded coverage rules
    pub fn with_repository(
        repository: Arc<InMemoryClaimsRepository>,
        flat_history: FlatHistoryTable,
        tables: RuleTables,
        lookup_timeout: Duration,
    ) -> Self {
        let policy = policy_resolver(repository.clone(), lookup_timeout);
        let history = HistoryAssessor::new(
            vec![
                Arc::new(RepositoryHistoryLookup::new(repository)),
                Arc::new(FlatTableHistoryLookup::new(flat_history)),
            ],
            lookup_timeout,
        );

        Self {
            policy: Arc::new(policy),
            coverage: Arc::new(CoverageEvaluator::embedded()),
            exclusions: Arc::new(ExclusionScreener::default()),
            documents: Arc::new(DocumentVerifier::new(tables.documents)),
            history: Arc::new(history),
            payout: Arc::new(PayoutCalculator::new(tables.depreciation)),
            decision: Arc::new(DecisionEngine::new(tables.business.auto_approval_limit)),
        }
    }
}

fn policy_resolver(repository: Arc<InMemoryClaimsRepository>, timeout: Duration) -> PolicyResolver {
    PolicyResolver::new(vec![Arc::new(RepositoryPolicyLookup::new(repository))], timeout)
}

fn load_data(
    dir: &Path,
) -> (
    RuleTables,
    InMemoryClaimsRepository,
    FlatHistoryTable,
    InMemoryPolicyContext,
) {
    info!(data_dir = %dir.display(), "Loading rule tables and seed data");
    let repository = InMemoryClaimsRepository::load(dir);
    info!(policies = repository.policy_count(), "Policy repository ready");
    (
        RuleTables::load(dir),
        repository,
        FlatHistoryTable::load(dir),
        InMemoryPolicyContext::load(dir),
    )
}

/// Builds the claim graph. Edges point from prerequisite to dependent.
pub fn build_claim_graph(services: &ClaimServices) -> Result<Graph> {
    use task_ids::*;

    let graph = GraphBuilder::new(CLAIM_GRAPH_ID)
        .add_task(Arc::new(ExtractClaimTask))
        .add_task(Arc::new(RetrievePolicyTask::new(services.policy.clone())))
        .add_task(Arc::new(CheckCoverageTask::new(services.coverage.clone())))
        .add_task(Arc::new(CheckExclusionsTask::new(
            services.exclusions.clone(),
        )))
        .add_task(Arc::new(VerifyDocumentsTask::new(services.documents.clone())))
        .add_task(Arc::new(CheckClaimHistoryTask::new(
            services.history.clone(),
        )))
        .add_task(Arc::new(CalculatePayoutTask::new(services.payout.clone())))
        .add_task(Arc::new(MakeDecisionTask::new(services.decision.clone())))
        .add_task(Arc::new(GenerateReportTask))
        .add_edge(EXTRACT, POLICY)
        .add_edge(EXTRACT, COVERAGE)
        .add_edge(EXTRACT, EXCLUSIONS)
        .add_edge(EXTRACT, DOCUMENTS)
        .add_edge(EXTRACT, HISTORY)
        .add_edge(POLICY, COVERAGE)
        .add_edge(POLICY, EXCLUSIONS)
        .add_edge(COVERAGE, PAYOUT)
        .add_edge(COVERAGE, DECISION)
        .add_edge(EXCLUSIONS, DECISION)
        .add_edge(PAYOUT, DECISION)
        .add_edge(DOCUMENTS, DECISION)
        .add_edge(HISTORY, DECISION)
        .add_edge(DECISION, REPORT)
        .set_finalizer(Arc::new(FinalizeClaimTask))
        .try_build()?;
    Ok(graph)
}

/// What the caller gets back for every claim, whatever happened inside
#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub claim_id: String,
    pub session_id: String,
    pub decision: Decision,
    pub report: String,
    pub processing_time_secs: f64,
    pub tool_calls: usize,
    pub status: ExecutionStatus,
    pub trace: ExecutionTrace,
}

/// Condensed view of a session's trace
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingSummary {
    pub session_id: String,
    pub claim_id: Option<String>,
    pub total_steps: usize,
    pub reasoning_steps: usize,
    pub tool_calls: usize,
    pub successful_calls: usize,
    pub failed_calls: usize,
    pub final_decision: Option<String>,
    pub duration_ms: Option<i64>,
}

pub struct ClaimOrchestrator {
    graph: Arc<Graph>,
    selector: Arc<dyn StepSelector>,
    storage: Arc<dyn SessionStorage>,
    max_tool_calls: usize,
}

impl ClaimOrchestrator {
    pub fn new(services: &ClaimServices, config: &ProcessingConfig) -> Result<Self> {
        let graph = Arc::new(build_claim_graph(services)?);
        let order = task_ids::PROCESSING_ORDER
            .iter()
            .map(|id| id.to_string())
            .collect();
        let selector = if config.parallel {
            FixedOrderSelector::new(order).parallel()
        } else {
            FixedOrderSelector::new(order)
        };
        info!(
            parallel = selector.is_parallel(),
            max_tool_calls = config.max_tool_calls,
            "Claim orchestrator ready"
        );

        Ok(Self {
            graph,
            selector: Arc::new(selector),
            storage: Arc::new(InMemorySessionStorage::new()),
            max_tool_calls: config.max_tool_calls,
        })
    }

    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        Self::new(&ClaimServices::from_config(config)?, config)
    }

    /// Replaces the reference fixed-order selector
    pub fn with_selector(mut self, selector: Arc<dyn StepSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = storage;
        self
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Runs a claim end to end. Never fails: every failure inside the
    /// pipeline degrades into the decision and report.
    pub async fn process(&self, raw: RawClaim) -> ClaimOutcome {
        let started = std::time::Instant::now();
        let mut session = self.new_session(raw).await;
        let claim_id: String = session
            .context
            .get(session_keys::CLAIM_ID)
            .await
            .unwrap_or_default();

        info!(session_id = %session.id, claim_id = %claim_id, "Processing claim");
        let result = self
            .graph
            .execute_session(&mut session, self.selector.as_ref())
            .await;

        let outcome = self
            .outcome(&session, claim_id, result.status, started.elapsed())
            .await;
        if let Err(e) = self.storage.save(session).await {
            error!(session_id = %outcome.session_id, error = %e, "Failed to save session");
        }

        info!(
            claim_id = %outcome.claim_id,
            decision = %outcome.decision.outcome,
            tool_calls = outcome.tool_calls,
            processing_time_secs = outcome.processing_time_secs,
            "Claim processed"
        );
        outcome
    }

    /// Stores a new session for the claim without running it. Drive it with
    /// [`ClaimOrchestrator::advance`].
    pub async fn begin(&self, raw: RawClaim) -> Result<String> {
        let session = self.new_session(raw).await;
        let session_id = session.id.clone();
        self.storage.save(session).await?;
        Ok(session_id)
    }

    /// One selector decision on a stored session
    pub async fn advance(&self, session_id: &str) -> Result<ExecutionResult> {
        let runner = FlowRunner::new(
            self.graph.clone(),
            self.selector.clone(),
            self.storage.clone(),
        );
        Ok(runner.step(session_id).await?)
    }

    pub async fn trace(&self, session_id: &str) -> Option<ExecutionTrace> {
        self.load(session_id).await.map(|s| s.trace)
    }

    pub async fn summary(&self, session_id: &str) -> Option<ProcessingSummary> {
        let session = self.load(session_id).await?;
        let trace = &session.trace;
        let successful_calls = trace.successful_invocations();
        Some(ProcessingSummary {
            session_id: session.id.clone(),
            claim_id: session.context.get(session_keys::CLAIM_ID).await,
            total_steps: session.step_count,
            reasoning_steps: trace.reasoning_steps.len(),
            tool_calls: trace.tool_invocations.len(),
            successful_calls,
            failed_calls: trace.tool_invocations.len() - successful_calls,
            final_decision: trace.final_decision.clone(),
            duration_ms: trace
                .end_time
                .map(|end| (end - trace.start_time).num_milliseconds()),
        })
    }

    async fn load(&self, session_id: &str) -> Option<Session> {
        match self.storage.get(session_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load session");
                None
            }
        }
    }

    async fn new_session(&self, raw: RawClaim) -> Session {
        let session = Session::new(Uuid::new_v4().to_string(), CLAIM_GRAPH_ID)
            .with_max_steps(self.max_tool_calls);
        let context = &session.context;
        context.set(session_keys::SESSION_ID, &session.id).await;
        context.set(session_keys::CLAIM_ID, new_claim_id()).await;
        context.set(session_keys::STARTED_AT, Utc::now()).await;
        context.set(session_keys::RAW_CLAIM, raw).await;
        session
    }

    async fn outcome(
        &self,
        session: &Session,
        claim_id: String,
        status: ExecutionStatus,
        elapsed: Duration,
    ) -> ClaimOutcome {
        let decision = match session.context.get::<Decision>(session_keys::DECISION).await {
            Some(decision) => decision,
            None => {
                warn!(session_id = %session.id, "Finalizer left no decision");
                default_decision(None)
            }
        };
        let report = match session.context.get::<String>(session_keys::REPORT).await {
            Some(report) => report,
            None => fallback_report(&claim_id, &decision),
        };

        ClaimOutcome {
            claim_id,
            session_id: session.id.clone(),
            decision,
            report,
            processing_time_secs: elapsed.as_secs_f64(),
            tool_calls: session.step_count,
            status,
            trace: session.trace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_id_format() {
        let id = new_claim_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CLM");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn claim_graph_encodes_preconditions() {
        let services = ClaimServices::with_repository(
            Arc::new(InMemoryClaimsRepository::new()),
            FlatHistoryTable::default(),
            RuleTables::default(),
            Duration::from_secs(1),
        );
        let graph = build_claim_graph(&services).unwrap();

        assert_eq!(graph.task_ids().len(), 9);
        assert!(graph.prerequisites(task_ids::EXTRACT).is_empty());
        let mut decision_prereqs = graph.prerequisites(task_ids::DECISION);
        decision_prereqs.sort();
        assert_eq!(
            decision_prereqs,
            vec![
                task_ids::PAYOUT,
                task_ids::HISTORY,
                task_ids::COVERAGE,
                task_ids::EXCLUSIONS,
                task_ids::DOCUMENTS,
            ]
        );
        assert_eq!(graph.prerequisites(task_ids::REPORT), vec![task_ids::DECISION]);
    }
}
