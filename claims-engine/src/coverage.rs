//! Coverage evaluation: remote rules service first, embedded rules otherwise.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{ClaimsError, Result};
use crate::model::{ClaimType, CoverageLimit, CoverageResult, CoverageSource, Domain, PolicyRecord};

pub const DEFAULT_HEALTH_LIMIT: f64 = 500_000.0;
pub const DEFAULT_HOME_LIMIT: f64 = 1_000_000.0;

/// Remote coverage-rules collaborator
#[async_trait]
pub trait CoverageRulesService: Send + Sync {
    async fn check(&self, claim_type: &str, policy_number: &str) -> Result<CoverageResult>;
}

#[derive(Serialize)]
struct CoverageRequest<'a> {
    claim_type: &'a str,
    policy_number: &'a str,
}

#[derive(Deserialize)]
struct CoverageResponse {
    #[serde(default)]
    covered: bool,
    #[serde(default)]
    section: String,
    /// Absent or null means no limit
    coverage_limit: Option<f64>,
    error: Option<String>,
}

/// `POST {base_url}/check-coverage`
pub struct HttpCoverageService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCoverageService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CoverageRulesService for HttpCoverageService {
    async fn check(&self, claim_type: &str, policy_number: &str) -> Result<CoverageResult> {
        let url = format!("{}/check-coverage", self.base_url);
        let response: CoverageResponse = self
            .client
            .post(&url)
            .json(&CoverageRequest {
                claim_type,
                policy_number,
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(ClaimsError::Remote(error));
        }
        Ok(CoverageResult {
            covered: response.covered,
            section: response.section,
            coverage_limit: response
                .coverage_limit
                .map(CoverageLimit::Amount)
                .unwrap_or(CoverageLimit::Unbounded),
            source: CoverageSource::RulesService,
        })
    }
}

pub struct CoverageEvaluator {
    service: Option<Arc<dyn CoverageRulesService>>,
    timeout: Duration,
}

impl CoverageEvaluator {
    /// Evaluator that only uses the embedded rules
    pub fn embedded() -> Self {
        Self {
            service: None,
            timeout: Duration::from_secs(crate::config::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_service(service: Arc<dyn CoverageRulesService>, timeout: Duration) -> Self {
        Self {
            service: Some(service),
            timeout,
        }
    }

    pub async fn evaluate(&self, claim_type: &ClaimType, policy: &PolicyRecord) -> CoverageResult {
        info!(claim_type = %claim_type, "Checking coverage");

        if let Some(service) = &self.service {
            let call = service.check(claim_type.as_str(), &policy.policy_number);
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(result)) => {
                    log_result(&result);
                    return result;
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Coverage rules service unavailable, using embedded rules")
                }
                Err(_) => warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Coverage rules service timed out, using embedded rules"
                ),
            }
        }

        let result = embedded_rules(claim_type, policy);
        log_result(&result);
        result
    }
}

fn log_result(result: &CoverageResult) {
    if result.covered {
        info!(section = %result.section, "Covered");
    } else {
        info!(section = %result.section, "Not covered");
    }
}

fn covered(section: &str, limit: f64) -> CoverageResult {
    CoverageResult {
        covered: true,
        section: section.to_string(),
        coverage_limit: CoverageLimit::Amount(limit),
        source: CoverageSource::EmbeddedRules,
    }
}

fn not_covered(section: &str) -> CoverageResult {
    CoverageResult {
        covered: false,
        section: section.to_string(),
        coverage_limit: CoverageLimit::Amount(0.0),
        source: CoverageSource::EmbeddedRules,
    }
}

/// Rule-based coverage. Pure.
pub fn embedded_rules(claim_type: &ClaimType, policy: &PolicyRecord) -> CoverageResult {
    let name = claim_type.as_str();
    match claim_type.domain() {
        Domain::Health => {
            let section = if name.contains("accident") {
                "Section 2: Accidental Injury Cover"
            } else if name.contains("surgery") {
                "Section 3: Surgical Procedures"
            } else if name.contains("critical") {
                "Section 4: Critical Illness Cover"
            } else {
                "Section 1: Hospitalization Cover"
            };
            covered(section, policy.sum_insured.unwrap_or(DEFAULT_HEALTH_LIMIT))
        }
        Domain::Motor => match policy.coverage_type.as_str() {
            "comprehensive" => covered(
                "Section 2.1: Own Damage",
                policy.idv.or(policy.sum_insured).unwrap_or(0.0),
            ),
            "third_party" => {
                if name.to_lowercase().contains("third_party") {
                    CoverageResult {
                        covered: true,
                        section: "Section 1: Third Party Liability".to_string(),
                        coverage_limit: CoverageLimit::Unbounded,
                        source: CoverageSource::EmbeddedRules,
                    }
                } else {
                    not_covered("Not Covered")
                }
            }
            _ => covered(
                "Section 2.1: Own Damage",
                policy.idv.or(policy.sum_insured).unwrap_or(0.0),
            ),
        },
        Domain::Home => {
            let section = if name.contains("fire") {
                "Section 1: Fire and Allied Perils"
            } else if name.contains("theft") {
                "Section 2: Burglary and Theft"
            } else if name.contains("flood") {
                "Section 3: Natural Calamities - Flood"
            } else if name.contains("earthquake") {
                "Section 3: Natural Calamities - Earthquake"
            } else if name.contains("storm") {
                "Section 3: Natural Calamities - Storm"
            } else {
                "Section 1: General Property Damage"
            };
            covered(section, policy.sum_insured.unwrap_or(DEFAULT_HOME_LIMIT))
        }
        Domain::Other => not_covered("Unknown Coverage"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn policy(coverage_type: &str) -> PolicyRecord {
        let mut policy = PolicyRecord::fallback("TS09EF5678");
        policy.coverage_type = coverage_type.to_string();
        policy
    }

    #[test]
    fn health_sections_by_subtype() {
        let mut health = policy("individual");
        health.sum_insured = None;
        let cases = [
            (ClaimType::HealthAccident, "Section 2: Accidental Injury Cover"),
            (ClaimType::HealthSurgery, "Section 3: Surgical Procedures"),
            (ClaimType::HealthCriticalIllness, "Section 4: Critical Illness Cover"),
            (ClaimType::HealthHospitalization, "Section 1: Hospitalization Cover"),
        ];
        for (claim_type, section) in cases {
            let result = embedded_rules(&claim_type, &health);
            assert!(result.covered);
            assert_eq!(result.section, section);
            assert_eq!(result.coverage_limit, CoverageLimit::Amount(DEFAULT_HEALTH_LIMIT));
        }
    }

    #[test]
    fn motor_depends_on_coverage_type() {
        let comprehensive = embedded_rules(&ClaimType::MotorTheft, &policy("comprehensive"));
        assert!(comprehensive.covered);
        assert_eq!(comprehensive.section, "Section 2.1: Own Damage");
        assert_eq!(comprehensive.coverage_limit, CoverageLimit::Amount(1_550_000.0));

        let third_party = embedded_rules(&ClaimType::MotorAccident, &policy("third_party"));
        assert!(!third_party.covered);
        assert_eq!(third_party.section, "Not Covered");
        assert_eq!(third_party.coverage_limit, CoverageLimit::Amount(0.0));

        let unknown = embedded_rules(&ClaimType::MotorFire, &policy("premium_plus"));
        assert!(unknown.covered);
        assert_eq!(unknown.section, "Section 2.1: Own Damage");
    }

    #[test]
    fn home_sections_and_unknown_domain() {
        let mut home = policy("standard");
        home.sum_insured = None;
        let flood = embedded_rules(&ClaimType::HomeFlood, &home);
        assert_eq!(flood.section, "Section 3: Natural Calamities - Flood");
        assert_eq!(flood.coverage_limit, CoverageLimit::Amount(DEFAULT_HOME_LIMIT));

        let other = embedded_rules(&ClaimType::Other("pet insurance".into()), &home);
        assert!(!other.covered);
        assert_eq!(other.section, "Unknown Coverage");
    }

    #[test]
    fn explicit_zero_sum_insured_is_the_limit() {
        let mut health = policy("individual");
        health.sum_insured = Some(0.0);
        let result = embedded_rules(&ClaimType::HealthHospitalization, &health);
        assert!(result.covered);
        assert_eq!(result.coverage_limit, CoverageLimit::Amount(0.0));

        let mut home = policy("standard");
        home.sum_insured = Some(0.0);
        let result = embedded_rules(&ClaimType::HomeFire, &home);
        assert_eq!(result.coverage_limit, CoverageLimit::Amount(0.0));

        let mut motor = policy("comprehensive");
        motor.idv = None;
        motor.sum_insured = Some(640_000.0);
        let result = embedded_rules(&ClaimType::MotorAccident, &motor);
        assert_eq!(result.coverage_limit, CoverageLimit::Amount(640_000.0));
    }

    struct Failing;

    #[async_trait]
    impl CoverageRulesService for Failing {
        async fn check(&self, _claim_type: &str, _policy_number: &str) -> Result<CoverageResult> {
            Err(ClaimsError::Remote("rules engine offline".into()))
        }
    }

    #[tokio::test]
    async fn service_failure_falls_back_to_embedded_rules() {
        let evaluator = CoverageEvaluator::with_service(Arc::new(Failing), Duration::from_secs(1));
        let result = evaluator
            .evaluate(&ClaimType::MotorAccident, &policy("comprehensive"))
            .await;
        assert!(result.covered);
        assert_eq!(result.source, CoverageSource::EmbeddedRules);
    }

    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn http_service_result_is_used() {
        let url = serve_once(
            r#"{"covered": false, "section": "Section 9: Excluded Perils", "coverage_limit": 0}"#,
        )
        .await;
        let service = HttpCoverageService::new(url, Duration::from_secs(5)).unwrap();
        let evaluator = CoverageEvaluator::with_service(Arc::new(service), Duration::from_secs(5));

        let result = evaluator
            .evaluate(&ClaimType::MotorAccident, &policy("comprehensive"))
            .await;

        assert!(!result.covered);
        assert_eq!(result.section, "Section 9: Excluded Perils");
        assert_eq!(result.source, CoverageSource::RulesService);
    }

    #[tokio::test]
    async fn http_error_marker_falls_back() {
        let url = serve_once(r#"{"error": "unknown policy"}"#).await;
        let service = HttpCoverageService::new(url, Duration::from_secs(5)).unwrap();
        let evaluator = CoverageEvaluator::with_service(Arc::new(service), Duration::from_secs(5));

        let result = evaluator
            .evaluate(&ClaimType::HomeStorm, &policy("standard"))
            .await;

        assert_eq!(result.section, "Section 3: Natural Calamities - Storm");
        assert_eq!(result.source, CoverageSource::EmbeddedRules);
    }
}
