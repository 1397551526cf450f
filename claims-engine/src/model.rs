//! Typed records that flow between the claim components.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw fields collected during intake, before normalization
pub type RawClaim = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Motor,
    Home,
    Health,
    Other,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Motor => "motor",
            Domain::Home => "home",
            Domain::Health => "health",
            Domain::Other => "other",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the 13 canonical claim types, or the lower-cased raw text when the
/// domain could not be recognized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimType {
    MotorAccident,
    MotorTheft,
    MotorFire,
    MotorVandalism,
    HomeFire,
    HomeTheft,
    HomeFlood,
    HomeEarthquake,
    HomeStorm,
    HealthAccident,
    HealthSurgery,
    HealthCriticalIllness,
    HealthHospitalization,
    Other(String),
}

impl ClaimType {
    pub const CANONICAL: [ClaimType; 13] = [
        ClaimType::MotorAccident,
        ClaimType::MotorTheft,
        ClaimType::MotorFire,
        ClaimType::MotorVandalism,
        ClaimType::HomeFire,
        ClaimType::HomeTheft,
        ClaimType::HomeFlood,
        ClaimType::HomeEarthquake,
        ClaimType::HomeStorm,
        ClaimType::HealthAccident,
        ClaimType::HealthSurgery,
        ClaimType::HealthCriticalIllness,
        ClaimType::HealthHospitalization,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ClaimType::MotorAccident => "motor_accident",
            ClaimType::MotorTheft => "motor_theft",
            ClaimType::MotorFire => "motor_fire",
            ClaimType::MotorVandalism => "motor_vandalism",
            ClaimType::HomeFire => "home_fire",
            ClaimType::HomeTheft => "home_theft",
            ClaimType::HomeFlood => "home_flood",
            ClaimType::HomeEarthquake => "home_earthquake",
            ClaimType::HomeStorm => "home_storm",
            ClaimType::HealthAccident => "health_accident",
            ClaimType::HealthSurgery => "health_surgery",
            ClaimType::HealthCriticalIllness => "health_critical_illness",
            ClaimType::HealthHospitalization => "health_hospitalization",
            ClaimType::Other(raw) => raw,
        }
    }

    /// Exact match against the canonical names
    pub fn from_canonical(name: &str) -> Option<ClaimType> {
        Self::CANONICAL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn domain(&self) -> Domain {
        match self {
            ClaimType::MotorAccident
            | ClaimType::MotorTheft
            | ClaimType::MotorFire
            | ClaimType::MotorVandalism => Domain::Motor,
            ClaimType::HomeFire
            | ClaimType::HomeTheft
            | ClaimType::HomeFlood
            | ClaimType::HomeEarthquake
            | ClaimType::HomeStorm => Domain::Home,
            ClaimType::HealthAccident
            | ClaimType::HealthSurgery
            | ClaimType::HealthCriticalIllness
            | ClaimType::HealthHospitalization => Domain::Health,
            ClaimType::Other(_) => Domain::Other,
        }
    }

    pub fn is_canonical(&self) -> bool {
        !matches!(self, ClaimType::Other(_))
    }
}

impl From<String> for ClaimType {
    fn from(value: String) -> Self {
        ClaimType::from_canonical(&value).unwrap_or(ClaimType::Other(value))
    }
}

impl From<ClaimType> for String {
    fn from(value: ClaimType) -> Self {
        match value {
            ClaimType::Other(raw) => raw,
            canonical => canonical.as_str().to_string(),
        }
    }
}

impl fmt::Display for ClaimType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-specific part of a claim. A record only ever carries the fields of
/// its own domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "lowercase")]
pub enum ClaimDetails {
    Motor {
        vehicle_registration: String,
        damage_description: String,
        repair_estimate: f64,
        vehicle_age_years: f64,
    },
    Home {
        property_id: String,
        damage_description: String,
        repair_estimate: f64,
    },
    Health {
        hospital_name: String,
        treatment_type: String,
        hospitalization_date: String,
        treatment_cost: f64,
        medical_bills: String,
    },
    Other,
}

/// Normalized claim, owned by one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub claim_type: ClaimType,
    pub incident_date: String,
    pub customer_id: String,
    pub location: String,
    pub submitted_documents: Vec<String>,
    pub policy_number: Option<String>,
    pub details: ClaimDetails,
}

impl ClaimRecord {
    pub fn domain(&self) -> Domain {
        self.claim_type.domain()
    }

    /// Repair estimate for motor/home, treatment cost for health
    pub fn claim_amount(&self) -> f64 {
        match &self.details {
            ClaimDetails::Motor {
                repair_estimate, ..
            }
            | ClaimDetails::Home {
                repair_estimate, ..
            } => *repair_estimate,
            ClaimDetails::Health { treatment_cost, .. } => *treatment_cost,
            ClaimDetails::Other => 0.0,
        }
    }

    pub fn vehicle_registration(&self) -> Option<&str> {
        match &self.details {
            ClaimDetails::Motor {
                vehicle_registration,
                ..
            } if !vehicle_registration.is_empty() => Some(vehicle_registration),
            _ => None,
        }
    }

    pub fn property_id(&self) -> Option<&str> {
        match &self.details {
            ClaimDetails::Home { property_id, .. } if !property_id.is_empty() => Some(property_id),
            _ => None,
        }
    }

    pub fn vehicle_age_years(&self) -> f64 {
        match &self.details {
            ClaimDetails::Motor {
                vehicle_age_years, ..
            } => *vehicle_age_years,
            _ => DEFAULT_VEHICLE_AGE_YEARS,
        }
    }

    /// Identifier handed to the policy resolver: an explicit policy number,
    /// then the insured asset, then the customer.
    pub fn policy_identifier(&self) -> String {
        self.policy_number
            .as_deref()
            .filter(|p| !p.is_empty())
            .or_else(|| self.vehicle_registration())
            .or_else(|| self.property_id())
            .unwrap_or(&self.customer_id)
            .to_string()
    }
}

pub const DEFAULT_VEHICLE_AGE_YEARS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found in the policy repository
    Repository,
    /// Generic record used when no lookup strategy found a policy
    Fallback,
}

/// Text snippet from the policy-context lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnippet {
    pub source: String,
    pub text: String,
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub policy_number: String,
    pub identifier: String,
    pub policy_type: Domain,
    pub coverage_type: String,
    /// `None` when the source record has no sum insured at all
    pub sum_insured: Option<f64>,
    pub premium: Option<f64>,
    pub deductible: Option<f64>,
    pub policy_start: Option<NaiveDate>,
    pub policy_end: Option<NaiveDate>,
    pub status: String,
    pub customer_id: Option<String>,
    pub customer_name: Option<String>,
    pub vehicle: Option<String>,
    pub vehicle_registration: Option<String>,
    pub idv: Option<f64>,
    pub zero_depreciation: Option<bool>,
    pub ncb_percentage: Option<f64>,
    pub property_id: Option<String>,
    pub policy_holder_age: Option<u32>,
    pub copay_percentage: Option<f64>,
    pub room_rent_limit: Option<f64>,
    #[serde(default)]
    pub context: Vec<PolicySnippet>,
    pub provenance: Provenance,
    pub error: Option<String>,
}

impl PolicyRecord {
    /// Comprehensive motor policy used when no lookup finds the identifier
    pub fn fallback(identifier: &str) -> Self {
        Self {
            policy_number: "MI-2024-3456".to_string(),
            identifier: identifier.to_string(),
            policy_type: Domain::Motor,
            coverage_type: "comprehensive".to_string(),
            sum_insured: Some(1_550_000.0),
            premium: None,
            deductible: Some(2_000.0),
            policy_start: NaiveDate::from_ymd_opt(2024, 1, 1),
            policy_end: NaiveDate::from_ymd_opt(2025, 1, 1),
            status: "active".to_string(),
            customer_id: None,
            customer_name: None,
            vehicle: Some("Hyundai Creta 2023".to_string()),
            vehicle_registration: None,
            idv: Some(1_550_000.0),
            zero_depreciation: Some(true),
            ncb_percentage: Some(20.0),
            property_id: None,
            policy_holder_age: None,
            copay_percentage: Some(10.0),
            room_rent_limit: None,
            context: Vec::new(),
            provenance: Provenance::Fallback,
            error: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Fallback
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLimit {
    Amount(f64),
    Unbounded,
}

impl CoverageLimit {
    pub fn amount(&self) -> Option<f64> {
        match self {
            CoverageLimit::Amount(v) => Some(*v),
            CoverageLimit::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageSource {
    RulesService,
    EmbeddedRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    pub covered: bool,
    pub section: String,
    pub coverage_limit: CoverageLimit,
    pub source: CoverageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionEntry {
    pub name: String,
    pub applies: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "calculation_type", rename_all = "snake_case")]
pub enum PayoutBreakdown {
    HealthCopay {
        copay_amount: f64,
        copay_percentage: f64,
        /// Informational only, never reduces the payable amount
        room_rent_limit: f64,
    },
    Depreciation {
        depreciation: f64,
        depreciation_rate: f64,
        zero_depreciation_applied: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutResult {
    pub claimed_amount: f64,
    pub deductible: f64,
    pub breakdown: PayoutBreakdown,
    pub payable_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    pub required: Vec<String>,
    pub submitted: Vec<String>,
    pub missing: Vec<String>,
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PastClaim {
    pub claim_id: String,
    pub claim_type: String,
    pub filed_date: NaiveDate,
    pub status: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskLevel {
    /// High on any fraud flag, medium above two past claims, low otherwise
    pub fn assess(fraud_flags: &[String], total_claims: usize) -> Self {
        if !fraud_flags.is_empty() {
            RiskLevel::High
        } else if total_claims > 2 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistorySource {
    Database,
    JsonFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub customer_found: bool,
    pub customer_name: Option<String>,
    /// Most recent first
    pub past_claims: Vec<PastClaim>,
    pub total_claims: usize,
    pub claim_free_years: u32,
    pub ncb_percentage: f64,
    pub fraud_flags: Vec<String>,
    pub risk_level: RiskLevel,
    pub source: HistorySource,
    pub error: Option<String>,
}

impl HistoryResult {
    pub fn not_found() -> Self {
        Self {
            customer_found: false,
            customer_name: None,
            past_claims: Vec::new(),
            total_claims: 0,
            claim_free_years: 0,
            ncb_percentage: 0.0,
            fraud_flags: Vec::new(),
            risk_level: RiskLevel::Unknown,
            source: HistorySource::JsonFallback,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionOutcome {
    Approved,
    Denied,
    Review,
}

impl DecisionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionOutcome::Approved => "APPROVED",
            DecisionOutcome::Denied => "DENIED",
            DecisionOutcome::Review => "REVIEW",
        }
    }
}

impl fmt::Display for DecisionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final verdict. Never modified once made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub outcome: DecisionOutcome,
    pub reasoning: String,
}

impl Decision {
    pub fn new(outcome: DecisionOutcome, reasoning: impl Into<String>) -> Self {
        Self {
            outcome,
            reasoning: reasoning.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_type_round_trips_through_its_name() {
        for claim_type in ClaimType::CANONICAL {
            let name: String = claim_type.clone().into();
            assert_eq!(ClaimType::from(name), claim_type);
        }
        assert_eq!(
            ClaimType::from("boat damage".to_string()),
            ClaimType::Other("boat damage".into())
        );
    }

    #[test]
    fn claim_type_serializes_as_plain_string() {
        let json = serde_json::to_value(ClaimType::HealthCriticalIllness).unwrap();
        assert_eq!(json, serde_json::json!("health_critical_illness"));
    }

    #[test]
    fn risk_level_rules() {
        assert_eq!(RiskLevel::assess(&["staged".into()], 0), RiskLevel::High);
        assert_eq!(RiskLevel::assess(&[], 3), RiskLevel::Medium);
        assert_eq!(RiskLevel::assess(&[], 2), RiskLevel::Low);
    }

    #[test]
    fn policy_identifier_prefers_explicit_number() {
        let mut claim = ClaimRecord {
            claim_type: ClaimType::MotorAccident,
            incident_date: String::new(),
            customer_id: "CUST001".into(),
            location: String::new(),
            submitted_documents: vec![],
            policy_number: None,
            details: ClaimDetails::Motor {
                vehicle_registration: "TS09EF5678".into(),
                damage_description: String::new(),
                repair_estimate: 0.0,
                vehicle_age_years: 1.0,
            },
        };
        assert_eq!(claim.policy_identifier(), "TS09EF5678");
        claim.policy_number = Some("MI-2024-0001".into());
        assert_eq!(claim.policy_identifier(), "MI-2024-0001");
        claim.details = ClaimDetails::Other;
        claim.policy_number = None;
        assert_eq!(claim.policy_identifier(), "CUST001");
    }
}
