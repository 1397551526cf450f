//! Policy resolution: an ordered chain of lookup strategies with a fixed
//! fallback record, plus optional enrichment from the policy-context lookup.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::{ClaimsError, Result};
use crate::model::{Domain, PolicyRecord, PolicySnippet, Provenance};
use crate::repository::{PolicyEntity, PolicyRepository};
use crate::tables::load_or_default;

/// Snippets attached to a resolved policy
pub const MAX_CONTEXT_SNIPPETS: usize = 2;
/// Characters kept from each snippet
pub const MAX_SNIPPET_CHARS: usize = 500;
pub const POLICY_DOCUMENTS_FILE: &str = "policy_documents.json";

/// One way of finding a policy by identifier
#[async_trait]
pub trait PolicyLookup: Send + Sync {
    fn name(&self) -> &str;

    async fn try_lookup(&self, identifier: &str) -> Result<Option<PolicyRecord>>;
}

/// Looks the identifier up in a `PolicyRepository`
pub struct RepositoryPolicyLookup {
    repository: Arc<dyn PolicyRepository>,
}

impl RepositoryPolicyLookup {
    pub fn new(repository: Arc<dyn PolicyRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl PolicyLookup for RepositoryPolicyLookup {
    fn name(&self) -> &str {
        "repository"
    }

    async fn try_lookup(&self, identifier: &str) -> Result<Option<PolicyRecord>> {
        let Some(entity) = self.repository.find_by_identifier(identifier).await? else {
            return Ok(None);
        };
        let customer_name = self
            .repository
            .find_customer_name(&entity.customer_id)
            .await?;
        map_entity(identifier, &entity, customer_name).map(Some)
    }
}

/// Maps a stored policy, attaching only the fields relevant to its domain
pub fn map_entity(
    identifier: &str,
    entity: &PolicyEntity,
    customer_name: Option<String>,
) -> Result<PolicyRecord> {
    if let Some(sum) = entity.sum_insured.filter(|s| !s.is_finite() || *s < 0.0) {
        return Err(ClaimsError::MalformedRecord(format!(
            "policy {} has invalid sum insured {}",
            entity.policy_number, sum
        )));
    }

    let mut record = PolicyRecord {
        policy_number: entity.policy_number.clone(),
        identifier: identifier.to_string(),
        policy_type: entity.policy_type,
        coverage_type: entity.coverage_type.clone().unwrap_or_default(),
        sum_insured: entity.sum_insured,
        premium: entity.premium,
        deductible: Some(entity.deductible),
        policy_start: Some(entity.policy_start),
        policy_end: Some(entity.policy_end),
        status: entity.status.clone(),
        customer_id: Some(entity.customer_id.clone()),
        customer_name: Some(customer_name.unwrap_or_else(|| "Unknown".to_string())),
        vehicle: None,
        vehicle_registration: None,
        idv: None,
        zero_depreciation: None,
        ncb_percentage: None,
        property_id: None,
        policy_holder_age: None,
        copay_percentage: None,
        room_rent_limit: None,
        context: Vec::new(),
        provenance: Provenance::Repository,
        error: None,
    };

    if let Some(reg) = entity.vehicle_registration.as_ref().filter(|r| !r.is_empty()) {
        record.vehicle_registration = Some(reg.clone());
        record.idv = entity.idv;
        record.zero_depreciation = Some(entity.zero_depreciation);
        record.ncb_percentage = Some(entity.ncb_percentage);
    }
    if let Some(property_id) = entity.property_id.as_ref().filter(|p| !p.is_empty()) {
        record.property_id = Some(property_id.clone());
    }
    if let Some(age) = entity.policy_holder_age.filter(|a| *a > 0) {
        record.policy_holder_age = Some(age);
        record.copay_percentage = Some(entity.copay_percentage);
    }

    Ok(record)
}

/// Source of free-text policy wording
#[async_trait]
pub trait PolicyContextLookup: Send + Sync {
    async fn search(&self, query: &str, domain: Domain, top_k: usize) -> Result<Vec<PolicySnippet>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub source: String,
    pub domain: Domain,
    pub text: String,
}

/// Scores documents by the share of query terms they contain
#[derive(Debug, Clone, Default)]
pub struct InMemoryPolicyContext {
    documents: Vec<PolicyDocument>,
}

impl InMemoryPolicyContext {
    pub fn new(documents: Vec<PolicyDocument>) -> Self {
        Self { documents }
    }

    /// Reads `policy_documents.json` from `dir`, empty when absent
    pub fn load(dir: &Path) -> Self {
        load_or_default(dir, POLICY_DOCUMENTS_FILE, |text| {
            Ok(Self::new(serde_json::from_str(text)?))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl PolicyContextLookup for InMemoryPolicyContext {
    async fn search(&self, query: &str, domain: Domain, top_k: usize) -> Result<Vec<PolicySnippet>> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| t.len() > 2)
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<PolicySnippet> = self
            .documents
            .iter()
            .filter(|doc| doc.domain == domain)
            .filter_map(|doc| {
                let text = doc.text.to_lowercase();
                let hits = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (hits > 0).then(|| PolicySnippet {
                    source: doc.source.clone(),
                    text: doc.text.chars().take(MAX_SNIPPET_CHARS).collect(),
                    relevance: hits as f64 / terms.len() as f64,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        scored.truncate(top_k);
        Ok(scored)
    }
}

/// Tries each lookup strategy in order and falls back to the generic record
pub struct PolicyResolver {
    strategies: Vec<Arc<dyn PolicyLookup>>,
    context: Option<Arc<dyn PolicyContextLookup>>,
    timeout: Duration,
}

impl PolicyResolver {
    pub fn new(strategies: Vec<Arc<dyn PolicyLookup>>, timeout: Duration) -> Self {
        Self {
            strategies,
            context: None,
            timeout,
        }
    }

    pub fn with_context(mut self, context: Arc<dyn PolicyContextLookup>) -> Self {
        self.context = Some(context);
        self
    }

    /// Always returns a usable record. Misses and outages fall through to the
    /// next strategy; unexpected errors are carried on the result.
    pub async fn resolve(&self, identifier: &str) -> PolicyRecord {
        info!(identifier = %identifier, "Retrieving policy");
        let mut error_marker = None;

        for strategy in &self.strategies {
            match tokio::time::timeout(self.timeout, strategy.try_lookup(identifier)).await {
                Ok(Ok(Some(mut record))) => {
                    info!(
                        strategy = strategy.name(),
                        policy_number = %record.policy_number,
                        "Policy found"
                    );
                    self.enrich(&mut record).await;
                    return record;
                }
                Ok(Ok(None)) => {
                    warn!(strategy = strategy.name(), identifier = %identifier, "Policy not found");
                }
                Ok(Err(e)) if e.is_unavailable() => {
                    warn!(strategy = strategy.name(), error = %e, "Policy lookup unavailable");
                }
                Ok(Err(e)) => {
                    error!(strategy = strategy.name(), error = %e, "Policy lookup failed");
                    error_marker = Some(e.to_string());
                }
                Err(_) => {
                    warn!(
                        strategy = strategy.name(),
                        timeout_secs = self.timeout.as_secs(),
                        "Policy lookup timed out"
                    );
                }
            }
        }

        info!(identifier = %identifier, "Using fallback policy record");
        let mut record = PolicyRecord::fallback(identifier);
        record.error = error_marker;
        record
    }

    async fn enrich(&self, record: &mut PolicyRecord) {
        let Some(context) = &self.context else {
            return;
        };
        let query = format!(
            "Coverage details and benefits for {} insurance",
            record.policy_type
        );
        let lookup = context.search(&query, record.policy_type, MAX_CONTEXT_SNIPPETS);
        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(snippets)) => {
                if !snippets.is_empty() {
                    info!(sections = snippets.len(), "Added policy context");
                }
                record.context = snippets.into_iter().take(MAX_CONTEXT_SNIPPETS).collect();
            }
            Ok(Err(e)) => warn!(error = %e, "Policy context lookup failed"),
            Err(_) => warn!("Policy context lookup timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{CustomerEntity, InMemoryClaimsRepository};
    use chrono::NaiveDate;

    fn entity() -> PolicyEntity {
        PolicyEntity {
            policy_number: "HI-2024-0101".into(),
            customer_id: "CUST002".into(),
            policy_type: Domain::Health,
            coverage_type: Some("family_floater".into()),
            sum_insured: Some(500_000.0),
            premium: Some(18_000.0),
            vehicle_registration: None,
            property_id: None,
            policy_holder_age: Some(42),
            idv: None,
            deductible: 2_000.0,
            zero_depreciation: false,
            ncb_percentage: 0.0,
            copay_percentage: 10.0,
            policy_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            policy_end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            status: "active".into(),
        }
    }

    fn resolver(repo: Arc<InMemoryClaimsRepository>) -> PolicyResolver {
        PolicyResolver::new(
            vec![Arc::new(RepositoryPolicyLookup::new(repo))],
            Duration::from_secs(1),
        )
    }

    struct Broken;

    #[async_trait]
    impl PolicyLookup for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn try_lookup(&self, _identifier: &str) -> Result<Option<PolicyRecord>> {
            Err(ClaimsError::MalformedRecord("policy row is corrupt".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl PolicyLookup for Hanging {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn try_lookup(&self, _identifier: &str) -> Result<Option<PolicyRecord>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }
    }

    #[test]
    fn health_mapping_attaches_only_health_fields() {
        let record = map_entity("HI-2024-0101", &entity(), None).unwrap();
        assert_eq!(record.copay_percentage, Some(10.0));
        assert_eq!(record.policy_holder_age, Some(42));
        assert!(record.idv.is_none());
        assert!(record.zero_depreciation.is_none());
        assert!(record.property_id.is_none());
        assert_eq!(record.customer_name.as_deref(), Some("Unknown"));
    }

    #[test]
    fn sum_insured_presence_is_preserved() {
        let mut zero = entity();
        zero.sum_insured = Some(0.0);
        assert_eq!(map_entity("HI-2024-0101", &zero, None).unwrap().sum_insured, Some(0.0));

        let mut absent = entity();
        absent.sum_insured = None;
        assert_eq!(map_entity("HI-2024-0101", &absent, None).unwrap().sum_insured, None);

        let mut negative = entity();
        negative.sum_insured = Some(-5.0);
        assert!(matches!(
            map_entity("HI-2024-0101", &negative, None),
            Err(ClaimsError::MalformedRecord(_))
        ));
    }

    #[test]
    fn motor_mapping_attaches_vehicle_terms() {
        let mut motor = entity();
        motor.policy_type = Domain::Motor;
        motor.policy_holder_age = None;
        motor.vehicle_registration = Some("KA05MN1234".into());
        motor.idv = Some(600_000.0);
        motor.zero_depreciation = true;
        motor.ncb_percentage = 20.0;

        let record = map_entity("KA05MN1234", &motor, Some("Asha".into())).unwrap();
        assert_eq!(record.idv, Some(600_000.0));
        assert_eq!(record.zero_depreciation, Some(true));
        assert_eq!(record.ncb_percentage, Some(20.0));
        assert!(record.copay_percentage.is_none());
    }

    #[tokio::test]
    async fn resolves_from_repository() {
        let repo = Arc::new(InMemoryClaimsRepository::new());
        repo.add_policy(entity());
        repo.add_customer(CustomerEntity {
            customer_id: "CUST002".into(),
            name: "Meera Iyer".into(),
            email: None,
            phone: None,
        });

        let record = resolver(repo).resolve("HI-2024-0101").await;
        assert_eq!(record.provenance, Provenance::Repository);
        assert_eq!(record.customer_name.as_deref(), Some("Meera Iyer"));
    }

    #[tokio::test]
    async fn outage_and_miss_fall_back_without_error_marker() {
        let repo = Arc::new(InMemoryClaimsRepository::new());
        let record = resolver(repo.clone()).resolve("UNKNOWN-1").await;
        assert!(record.is_fallback());
        assert_eq!(record.policy_number, "MI-2024-3456");
        assert!(record.error.is_none());

        repo.add_policy(entity());
        repo.set_available(false);
        let record = resolver(repo).resolve("HI-2024-0101").await;
        assert!(record.is_fallback());
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn unexpected_errors_become_a_marker() {
        let resolver = PolicyResolver::new(vec![Arc::new(Broken)], Duration::from_secs(1));
        let record = resolver.resolve("X").await;
        assert!(record.is_fallback());
        assert_eq!(
            record.error.as_deref(),
            Some("Malformed record: policy row is corrupt")
        );
    }

    #[tokio::test]
    async fn slow_strategy_is_abandoned_after_timeout() {
        let repo = Arc::new(InMemoryClaimsRepository::new());
        repo.add_policy(entity());
        let resolver = PolicyResolver::new(
            vec![
                Arc::new(Hanging),
                Arc::new(RepositoryPolicyLookup::new(repo)),
            ],
            Duration::from_millis(50),
        );

        let record = resolver.resolve("HI-2024-0101").await;
        assert_eq!(record.provenance, Provenance::Repository);
    }

    #[tokio::test]
    async fn enrichment_is_filtered_by_domain_and_capped() {
        let repo = Arc::new(InMemoryClaimsRepository::new());
        repo.add_policy(entity());
        let doc = |source: &str, domain, text: &str| PolicyDocument {
            source: source.into(),
            domain,
            text: text.into(),
        };
        let context = InMemoryPolicyContext::new(vec![
            doc("Health Shield", Domain::Health, "Coverage for hospitalization and benefits"),
            doc("Health Shield Riders", Domain::Health, "Critical illness benefits"),
            doc("Health Shield Claims", Domain::Health, "Insurance claims coverage details"),
            doc("Motor Secure", Domain::Motor, "Coverage details and benefits for own damage"),
        ]);

        let record = resolver(repo)
            .with_context(Arc::new(context))
            .resolve("HI-2024-0101")
            .await;

        assert_eq!(record.context.len(), MAX_CONTEXT_SNIPPETS);
        assert!(record.context.iter().all(|s| s.source.starts_with("Health")));
    }
}
