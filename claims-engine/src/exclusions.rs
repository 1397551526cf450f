//! Exclusion screening against a fixed catalogue.
//!
//! The reference detector never finds an exclusion. Real detection plugs in
//! through `ExclusionDetector`; the screener output keeps the same shape
//! either way.

use std::sync::Arc;
use tracing::{info, warn};

use crate::model::{ClaimRecord, ExclusionEntry, PolicyRecord};

pub const EXCLUSION_CATALOGUE: [&str; 7] = [
    "DUI (Driving Under Influence)",
    "Invalid or Expired License",
    "Commercial Use without Commercial Policy",
    "War or Nuclear Risk",
    "Consequential Losses",
    "Wear and Tear",
    "Mechanical/Electrical Breakdown",
];

pub const NO_INDICATION: &str = "No indication of this exclusion in claim details";

/// Decides whether one catalogue exclusion applies
pub trait ExclusionDetector: Send + Sync {
    /// `Some(reason)` when the exclusion applies
    fn detect(&self, exclusion: &str, claim: &ClaimRecord, policy: &PolicyRecord) -> Option<String>;
}

/// Reference detector: nothing ever applies
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExclusionDetector;

impl ExclusionDetector for NoExclusionDetector {
    fn detect(&self, _exclusion: &str, _claim: &ClaimRecord, _policy: &PolicyRecord) -> Option<String> {
        None
    }
}

pub struct ExclusionScreener {
    detector: Arc<dyn ExclusionDetector>,
}

impl Default for ExclusionScreener {
    fn default() -> Self {
        Self::new(Arc::new(NoExclusionDetector))
    }
}

impl ExclusionScreener {
    pub fn new(detector: Arc<dyn ExclusionDetector>) -> Self {
        Self { detector }
    }

    /// One entry per catalogue exclusion, in catalogue order
    pub fn screen(&self, claim: &ClaimRecord, policy: &PolicyRecord) -> Vec<ExclusionEntry> {
        let entries: Vec<ExclusionEntry> = EXCLUSION_CATALOGUE
            .iter()
            .map(|name| match self.detector.detect(name, claim, policy) {
                Some(reason) => ExclusionEntry {
                    name: name.to_string(),
                    applies: true,
                    reason,
                },
                None => ExclusionEntry {
                    name: name.to_string(),
                    applies: false,
                    reason: NO_INDICATION.to_string(),
                },
            })
            .collect();

        let applicable = entries.iter().filter(|e| e.applies).count();
        if applicable == 0 {
            info!("No exclusions apply");
        } else {
            warn!(applicable, "Exclusions apply");
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClaimDetails, ClaimType};

    fn claim(description: &str) -> ClaimRecord {
        ClaimRecord {
            claim_type: ClaimType::MotorAccident,
            incident_date: "2024-06-01".into(),
            customer_id: "CUST001".into(),
            location: "Hyderabad".into(),
            submitted_documents: vec![],
            policy_number: None,
            details: ClaimDetails::Motor {
                vehicle_registration: "TS09EF5678".into(),
                damage_description: description.into(),
                repair_estimate: 45_000.0,
                vehicle_age_years: 2.0,
            },
        }
    }

    /// Flags wear and tear when the damage description says so
    struct WearAndTear;

    impl ExclusionDetector for WearAndTear {
        fn detect(&self, exclusion: &str, claim: &ClaimRecord, _policy: &PolicyRecord) -> Option<String> {
            let ClaimDetails::Motor {
                damage_description, ..
            } = &claim.details
            else {
                return None;
            };
            (exclusion == "Wear and Tear" && damage_description.contains("worn"))
                .then(|| "Damage attributed to worn parts".to_string())
        }
    }

    #[test]
    fn reference_screener_returns_full_catalogue_unapplied() {
        let entries =
            ExclusionScreener::default().screen(&claim("bumper dent"), &PolicyRecord::fallback("X"));

        assert_eq!(entries.len(), 7);
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, EXCLUSION_CATALOGUE);
        assert!(entries.iter().all(|e| !e.applies && e.reason == NO_INDICATION));
    }

    #[test]
    fn custom_detector_keeps_catalogue_shape() {
        let screener = ExclusionScreener::new(Arc::new(WearAndTear));
        let entries = screener.screen(&claim("worn brake pads"), &PolicyRecord::fallback("X"));

        assert_eq!(entries.len(), 7);
        let applied: Vec<&str> = entries
            .iter()
            .filter(|e| e.applies)
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(applied, vec!["Wear and Tear"]);
        assert_eq!(entries[5].reason, "Damage attributed to worn parts");
    }
}
