//! Read-only collaborators the claim components look records up in.
//!
//! The orchestrator only sees the traits. `InMemoryClaimsRepository` is the
//! concurrent in-process implementation, optionally seeded from
//! `policies.json` / `customers.json`, and `FlatHistoryTable` is the flat
//! `claims_history.json` fallback.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ClaimsError, Result};
use crate::model::{Domain, PastClaim};
use crate::tables::load_or_default;

pub const POLICIES_FILE: &str = "policies.json";
pub const CUSTOMERS_FILE: &str = "customers.json";
pub const CLAIMS_HISTORY_FILE: &str = "claims_history.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEntity {
    pub policy_number: String,
    pub customer_id: String,
    pub policy_type: Domain,
    pub coverage_type: Option<String>,
    #[serde(default)]
    pub sum_insured: Option<f64>,
    pub premium: Option<f64>,
    pub vehicle_registration: Option<String>,
    pub property_id: Option<String>,
    pub policy_holder_age: Option<u32>,
    pub idv: Option<f64>,
    #[serde(default)]
    pub deductible: f64,
    #[serde(default)]
    pub zero_depreciation: bool,
    #[serde(default)]
    pub ncb_percentage: f64,
    #[serde(default)]
    pub copay_percentage: f64,
    pub policy_start: NaiveDate,
    pub policy_end: NaiveDate,
    #[serde(default = "default_status")]
    pub status: String,
}

fn default_status() -> String {
    "active".to_string()
}

impl PolicyEntity {
    pub fn matches(&self, identifier: &str) -> bool {
        self.policy_number == identifier
            || self.vehicle_registration.as_deref() == Some(identifier)
            || self.property_id.as_deref() == Some(identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerEntity {
    pub customer_id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A filed claim, either still open or from the historical record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimEntity {
    pub claim_id: String,
    pub claim_type: String,
    pub status: String,
    pub filed_date: NaiveDate,
    pub estimated_cost: Option<f64>,
    pub payout_amount: Option<f64>,
}

impl ClaimEntity {
    /// Paid amount when settled, otherwise the estimate
    pub fn amount(&self) -> f64 {
        self.payout_amount
            .or(self.estimated_cost)
            .unwrap_or_default()
    }

    pub fn to_past_claim(&self) -> PastClaim {
        PastClaim {
            claim_id: self.claim_id.clone(),
            claim_type: self.claim_type.clone(),
            filed_date: self.filed_date,
            status: self.status.clone(),
            amount: self.amount(),
        }
    }
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Matches policy number, vehicle registration or property id
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<PolicyEntity>>;

    async fn find_customer_name(&self, customer_id: &str) -> Result<Option<String>>;
}

#[async_trait]
pub trait ClaimHistoryRepository: Send + Sync {
    async fn find_customer(&self, customer_id: &str) -> Result<Option<CustomerEntity>>;
    async fn active_claims(&self, customer_id: &str) -> Result<Vec<ClaimEntity>>;
    async fn historical_claims(&self, customer_id: &str) -> Result<Vec<ClaimEntity>>;
    async fn customer_policies(&self, customer_id: &str) -> Result<Vec<PolicyEntity>>;
}

/// Seed file shape for customers.json
#[derive(Debug, Deserialize)]
struct CustomerSeed {
    #[serde(flatten)]
    customer: CustomerEntity,
    #[serde(default)]
    active_claims: Vec<ClaimEntity>,
    #[serde(default)]
    claim_history: Vec<ClaimEntity>,
}

/// Concurrent in-memory store backing both repository traits
pub struct InMemoryClaimsRepository {
    customers: DashMap<String, CustomerEntity>,
    policies: DashMap<String, PolicyEntity>,
    active: DashMap<String, Vec<ClaimEntity>>,
    history: DashMap<String, Vec<ClaimEntity>>,
    available: AtomicBool,
}

impl InMemoryClaimsRepository {
    pub fn new() -> Self {
        Self {
            customers: DashMap::new(),
            policies: DashMap::new(),
            active: DashMap::new(),
            history: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Seeds from `policies.json` and `customers.json` in `dir`; missing or
    /// malformed files leave the store empty.
    pub fn load(dir: &Path) -> Self {
        let repo = Self::new();
        let policies: Vec<PolicyEntity> = load_or_default(dir, POLICIES_FILE, |text| {
            serde_json::from_str(text).map_err(ClaimsError::from)
        });
        for policy in policies {
            repo.add_policy(policy);
        }
        let customers: Vec<CustomerSeed> = load_or_default(dir, CUSTOMERS_FILE, |text| {
            serde_json::from_str(text).map_err(ClaimsError::from)
        });
        for seed in customers {
            let id = seed.customer.customer_id.clone();
            repo.add_customer(seed.customer);
            for claim in seed.active_claims {
                repo.add_active_claim(&id, claim);
            }
            for claim in seed.claim_history {
                repo.add_historical_claim(&id, claim);
            }
        }
        repo
    }

    pub fn add_customer(&self, customer: CustomerEntity) {
        self.customers.insert(customer.customer_id.clone(), customer);
    }

    pub fn add_policy(&self, policy: PolicyEntity) {
        self.policies.insert(policy.policy_number.clone(), policy);
    }

    pub fn add_active_claim(&self, customer_id: &str, claim: ClaimEntity) {
        self.active.entry(customer_id.to_string()).or_default().push(claim);
    }

    pub fn add_historical_claim(&self, customer_id: &str, claim: ClaimEntity) {
        self.history.entry(customer_id.to_string()).or_default().push(claim);
    }

    /// Simulates an outage: every call fails with `RepositoryUnavailable`
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClaimsError::RepositoryUnavailable(
                "in-memory repository is offline".to_string(),
            ))
        }
    }
}

impl Default for InMemoryClaimsRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryClaimsRepository {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<PolicyEntity>> {
        self.ensure_available()?;
        if let Some(policy) = self.policies.get(identifier) {
            return Ok(Some(policy.clone()));
        }
        Ok(self
            .policies
            .iter()
            .find(|entry| entry.value().matches(identifier))
            .map(|entry| entry.value().clone()))
    }

    async fn find_customer_name(&self, customer_id: &str) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.customers.get(customer_id).map(|c| c.name.clone()))
    }
}

#[async_trait]
impl ClaimHistoryRepository for InMemoryClaimsRepository {
    async fn find_customer(&self, customer_id: &str) -> Result<Option<CustomerEntity>> {
        self.ensure_available()?;
        Ok(self.customers.get(customer_id).map(|c| c.clone()))
    }

    async fn active_claims(&self, customer_id: &str) -> Result<Vec<ClaimEntity>> {
        self.ensure_available()?;
        Ok(self
            .active
            .get(customer_id)
            .map(|claims| claims.clone())
            .unwrap_or_default())
    }

    async fn historical_claims(&self, customer_id: &str) -> Result<Vec<ClaimEntity>> {
        self.ensure_available()?;
        Ok(self
            .history
            .get(customer_id)
            .map(|claims| claims.clone())
            .unwrap_or_default())
    }

    async fn customer_policies(&self, customer_id: &str) -> Result<Vec<PolicyEntity>> {
        self.ensure_available()?;
        Ok(self
            .policies
            .iter()
            .filter(|entry| entry.value().customer_id == customer_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

/// One entry of the flat history table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatHistoryEntry {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub past_claims: Vec<PastClaim>,
    #[serde(default)]
    pub claim_free_years: u32,
    #[serde(default)]
    pub ncb_percentage: f64,
    #[serde(default)]
    pub fraud_flags: Vec<String>,
}

/// Flat claim-history table keyed by customer id or vehicle registration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatHistoryTable {
    entries: HashMap<String, FlatHistoryEntry>,
}

impl FlatHistoryTable {
    pub fn new(entries: HashMap<String, FlatHistoryEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(Self {
            entries: serde_json::from_str(text)?,
        })
    }

    pub fn load(dir: &Path) -> Self {
        load_or_default(dir, CLAIMS_HISTORY_FILE, Self::from_json)
    }

    pub fn get(&self, key: &str) -> Option<&FlatHistoryEntry> {
        self.entries.get(key).filter(|entry| **entry != FlatHistoryEntry::default())
    }

    /// Tries the customer id, then the vehicle registration with whitespace
    /// removed and upper-cased.
    pub fn lookup(&self, customer_id: &str, vehicle_reg: &str) -> Option<&FlatHistoryEntry> {
        let normalized_reg: String = vehicle_reg
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase();
        [customer_id, normalized_reg.as_str()]
            .into_iter()
            .filter(|key| !key.is_empty())
            .find_map(|key| self.get(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor_policy() -> PolicyEntity {
        PolicyEntity {
            policy_number: "MI-2024-0001".into(),
            customer_id: "CUST001".into(),
            policy_type: Domain::Motor,
            coverage_type: Some("comprehensive".into()),
            sum_insured: Some(800_000.0),
            premium: Some(14_500.0),
            vehicle_registration: Some("TS09EF5678".into()),
            property_id: None,
            policy_holder_age: None,
            idv: Some(750_000.0),
            deductible: 1_000.0,
            zero_depreciation: false,
            ncb_percentage: 25.0,
            copay_percentage: 0.0,
            policy_start: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
            policy_end: NaiveDate::from_ymd_opt(2025, 3, 31).unwrap(),
            status: "active".into(),
        }
    }

    #[tokio::test]
    async fn finds_policy_by_any_identifier() {
        let repo = InMemoryClaimsRepository::new();
        repo.add_policy(motor_policy());

        for id in ["MI-2024-0001", "TS09EF5678"] {
            let found = repo.find_by_identifier(id).await.unwrap();
            assert_eq!(found.map(|p| p.policy_number).as_deref(), Some("MI-2024-0001"));
        }
        assert!(repo.find_by_identifier("KA01AB0000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_repository_reports_unavailable() {
        let repo = InMemoryClaimsRepository::new();
        repo.set_available(false);
        let err = repo.find_by_identifier("anything").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[test]
    fn flat_table_matches_normalized_registration() {
        let table = FlatHistoryTable::from_json(
            r#"{"TS09EF5678": {"customer_name": "Ravi", "claim_free_years": 3, "ncb_percentage": 35}}"#,
        )
        .unwrap();

        let entry = table.lookup("", " ts09 ef5678 ").unwrap();
        assert_eq!(entry.customer_name, "Ravi");
        assert_eq!(entry.claim_free_years, 3);
        assert!(table.lookup("CUST404", "").is_none());
    }

    #[tokio::test]
    async fn loads_seed_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(POLICIES_FILE),
            serde_json::to_string(&vec![motor_policy()]).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join(CUSTOMERS_FILE),
            r#"[{"customer_id": "CUST001", "name": "Ravi Kumar",
                 "claim_history": [{"claim_id": "CLM-OLD-1", "claim_type": "motor_accident",
                   "status": "settled", "filed_date": "2023-02-11", "payout_amount": 12000}]}]"#,
        )
        .unwrap();

        let repo = InMemoryClaimsRepository::load(dir.path());

        assert_eq!(repo.policy_count(), 1);
        let customer = repo.find_customer("CUST001").await.unwrap().unwrap();
        assert_eq!(customer.name, "Ravi Kumar");
        let history = repo.historical_claims("CUST001").await.unwrap();
        assert_eq!(history[0].amount(), 12_000.0);
        assert_eq!(repo.customer_policies("CUST001").await.unwrap().len(), 1);
    }
}
