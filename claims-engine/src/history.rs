//! Claim history and risk: repository first, flat history table second.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::model::{HistoryResult, HistorySource, PastClaim, RiskLevel};
use crate::repository::{ClaimHistoryRepository, FlatHistoryTable};

/// One way of finding a customer's claim history
#[async_trait]
pub trait HistoryLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn try_lookup(&self, customer_id: &str, vehicle_reg: &str)
    -> Result<Option<HistoryResult>>;
}

pub struct RepositoryHistoryLookup {
    repository: Arc<dyn ClaimHistoryRepository>,
}

impl RepositoryHistoryLookup {
    pub fn new(repository: Arc<dyn ClaimHistoryRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl HistoryLookup for RepositoryHistoryLookup {
    fn name(&self) -> &str {
        "repository"
    }

    async fn try_lookup(
        &self,
        customer_id: &str,
        _vehicle_reg: &str,
    ) -> Result<Option<HistoryResult>> {
        let Some(customer) = self.repository.find_customer(customer_id).await? else {
            return Ok(None);
        };

        let mut past_claims: Vec<PastClaim> = self
            .repository
            .active_claims(customer_id)
            .await?
            .iter()
            .chain(self.repository.historical_claims(customer_id).await?.iter())
            .map(|c| c.to_past_claim())
            .collect();
        past_claims.sort_by(|a, b| b.filed_date.cmp(&a.filed_date));

        let ncb_percentage = self
            .repository
            .customer_policies(customer_id)
            .await?
            .iter()
            .map(|p| p.ncb_percentage)
            .fold(0.0, f64::max);

        let total_claims = past_claims.len();
        // fraud scoring is not wired to a data source yet
        let fraud_flags = Vec::new();

        Ok(Some(HistoryResult {
            customer_found: true,
            customer_name: Some(customer.name),
            past_claims,
            total_claims,
            claim_free_years: if total_claims == 0 { 1 } else { 0 },
            ncb_percentage,
            risk_level: RiskLevel::assess(&fraud_flags, total_claims),
            fraud_flags,
            source: HistorySource::Database,
            error: None,
        }))
    }
}

pub struct FlatTableHistoryLookup {
    table: FlatHistoryTable,
}

impl FlatTableHistoryLookup {
    pub fn new(table: FlatHistoryTable) -> Self {
        Self { table }
    }
}

#[async_trait]
impl HistoryLookup for FlatTableHistoryLookup {
    fn name(&self) -> &str {
        "flat_table"
    }

    async fn try_lookup(
        &self,
        customer_id: &str,
        vehicle_reg: &str,
    ) -> Result<Option<HistoryResult>> {
        Ok(self.table.lookup(customer_id, vehicle_reg).map(|entry| {
            let mut past_claims = entry.past_claims.clone();
            past_claims.sort_by(|a, b| b.filed_date.cmp(&a.filed_date));
            let total_claims = past_claims.len();
            HistoryResult {
                customer_found: true,
                customer_name: Some(entry.customer_name.clone()).filter(|n| !n.is_empty()),
                past_claims,
                total_claims,
                claim_free_years: entry.claim_free_years,
                ncb_percentage: entry.ncb_percentage,
                fraud_flags: entry.fraud_flags.clone(),
                risk_level: RiskLevel::assess(&entry.fraud_flags, total_claims),
                source: HistorySource::JsonFallback,
                error: None,
            }
        }))
    }
}

pub struct HistoryAssessor {
    strategies: Vec<Arc<dyn HistoryLookup>>,
    timeout: Duration,
}

impl HistoryAssessor {
    pub fn new(strategies: Vec<Arc<dyn HistoryLookup>>, timeout: Duration) -> Self {
        Self {
            strategies,
            timeout,
        }
    }

    pub async fn assess(&self, customer_id: &str, vehicle_reg: &str) -> HistoryResult {
        info!(customer_id = %customer_id, "Checking claim history");
        let mut error_marker = None;

        for strategy in &self.strategies {
            let lookup = strategy.try_lookup(customer_id, vehicle_reg);
            match tokio::time::timeout(self.timeout, lookup).await {
                Ok(Ok(Some(result))) => {
                    info!(
                        strategy = strategy.name(),
                        total_claims = result.total_claims,
                        risk_level = %result.risk_level,
                        "Found claim history"
                    );
                    return result;
                }
                Ok(Ok(None)) => {
                    info!(strategy = strategy.name(), customer_id = %customer_id, "No history found");
                }
                Ok(Err(e)) if e.is_unavailable() => {
                    warn!(strategy = strategy.name(), error = %e, "History lookup unavailable");
                }
                Ok(Err(e)) => {
                    error!(strategy = strategy.name(), error = %e, "History lookup failed");
                    error_marker = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        strategy = strategy.name(),
                        timeout_secs = self.timeout.as_secs(),
                        "History lookup timed out"
                    );
                }
            }
        }

        let mut result = HistoryResult::not_found();
        result.error = error_marker;
        result
    }
}
