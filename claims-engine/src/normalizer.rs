//! Maps free-form intake data to a canonical, domain-typed claim record.
//!
//! Classification is plain keyword containment on the lower-cased claim type
//! text. It is deliberately loose: "scar tissue" mentions "car" and is read as
//! a motor claim. Tests below pin that behavior down.

use serde_json::Value;
use tracing::info;

use crate::model::{
    ClaimDetails, ClaimRecord, ClaimType, DEFAULT_VEHICLE_AGE_YEARS, Domain, RawClaim,
};

const MOTOR_KEYWORDS: &[&str] = &["motor", "vehicle", "car", "bike"];
const HOME_KEYWORDS: &[&str] = &["home", "house", "property"];
const HEALTH_KEYWORDS: &[&str] = &["health", "medical", "hospital"];

fn mentions(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

/// Canonical claim type for free text. Unrecognized domains pass through
/// lower-cased as `ClaimType::Other`.
pub fn classify(raw_type: &str) -> ClaimType {
    let text = raw_type.trim().to_lowercase();

    if mentions(&text, MOTOR_KEYWORDS) {
        if mentions(&text, &["accident", "collision"]) {
            ClaimType::MotorAccident
        } else if mentions(&text, &["theft", "stolen"]) {
            ClaimType::MotorTheft
        } else if mentions(&text, &["fire"]) {
            ClaimType::MotorFire
        } else if mentions(&text, &["vandalism", "vandal"]) {
            ClaimType::MotorVandalism
        } else {
            ClaimType::MotorAccident
        }
    } else if mentions(&text, HOME_KEYWORDS) {
        if mentions(&text, &["fire", "burn"]) {
            ClaimType::HomeFire
        } else if mentions(&text, &["theft", "burglary", "stolen"]) {
            ClaimType::HomeTheft
        } else if mentions(&text, &["flood", "water"]) {
            ClaimType::HomeFlood
        } else if mentions(&text, &["earthquake", "quake"]) {
            ClaimType::HomeEarthquake
        } else if mentions(&text, &["storm", "cyclone", "wind"]) {
            ClaimType::HomeStorm
        } else {
            ClaimType::HomeFire
        }
    } else if mentions(&text, HEALTH_KEYWORDS) {
        if mentions(&text, &["accident", "injury", "broke", "fracture"]) {
            ClaimType::HealthAccident
        } else if mentions(&text, &["surgery", "operation"]) {
            ClaimType::HealthSurgery
        } else if mentions(&text, &["critical", "heart", "cancer", "stroke"]) {
            ClaimType::HealthCriticalIllness
        } else {
            ClaimType::HealthHospitalization
        }
    } else {
        ClaimType::Other(text)
    }
}

/// Lenient amount parsing: JSON numbers or numeric strings with an optional
/// currency marker and thousands separators. Anything else is 0, as are
/// negative and non-finite values.
pub fn coerce_amount(value: Option<&Value>) -> f64 {
    parse_amount(value).unwrap_or(0.0)
}

fn parse_amount(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => parse_amount_text(s)?,
        _ => return None,
    };
    if parsed.is_finite() {
        Some(parsed.max(0.0))
    } else {
        None
    }
}

fn parse_amount_text(text: &str) -> Option<f64> {
    let mut rest = text.trim();
    for marker in ["₹", "$", "INR", "Rs.", "Rs"] {
        if let Some(stripped) = strip_prefix_ignore_case(rest, marker) {
            rest = stripped.trim_start();
            break;
        }
    }
    let cleaned: String = rest.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse().ok()
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}

fn text_field(raw: &RawClaim, key: &str) -> String {
    match raw.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Accepts a JSON array or a single comma-separated string
fn document_list(raw: &RawClaim) -> Vec<String> {
    match raw.get("submitted_documents") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

/// Builds the structured record. Never fails.
pub fn normalize(raw: &RawClaim) -> ClaimRecord {
    let raw_type = match raw.get("claim_type") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        _ => "unknown".to_string(),
    };
    let claim_type = classify(&raw_type);

    let details = match claim_type.domain() {
        Domain::Motor => ClaimDetails::Motor {
            vehicle_registration: text_field(raw, "vehicle_registration"),
            damage_description: text_field(raw, "damage_description"),
            repair_estimate: coerce_amount(raw.get("repair_estimate")),
            vehicle_age_years: parse_amount(raw.get("vehicle_age_years"))
                .unwrap_or(DEFAULT_VEHICLE_AGE_YEARS),
        },
        Domain::Home => ClaimDetails::Home {
            property_id: text_field(raw, "property_id"),
            damage_description: text_field(raw, "damage_description"),
            repair_estimate: coerce_amount(raw.get("repair_estimate")),
        },
        Domain::Health => ClaimDetails::Health {
            hospital_name: text_field(raw, "hospital_name"),
            treatment_type: text_field(raw, "treatment_type"),
            hospitalization_date: text_field(raw, "hospitalization_date"),
            treatment_cost: coerce_amount(raw.get("treatment_cost")),
            medical_bills: text_field(raw, "medical_bills"),
        },
        Domain::Other => ClaimDetails::Other,
    };

    let policy_number = Some(text_field(raw, "policy_number")).filter(|p| !p.is_empty());

    let record = ClaimRecord {
        claim_type,
        incident_date: text_field(raw, "incident_date"),
        customer_id: text_field(raw, "customer_id"),
        location: text_field(raw, "location"),
        submitted_documents: document_list(raw),
        policy_number,
        details,
    };

    info!(
        claim_type = %record.claim_type,
        amount = record.claim_amount(),
        documents = record.submitted_documents.len(),
        "Extracted claim"
    );
    record
}
