//! Required-document check against the document rules table.
//!
//! Matching is loose: a required document counts as present when either of
//! its first two words appears anywhere in the submitted names. "Policy copy"
//! is satisfied by "Insurance policy.pdf", and short words like "of" match
//! almost anything.

use tracing::info;

use crate::model::{ClaimType, DocumentStatus};
use crate::tables::DocumentRules;

pub const GENERIC_REQUIRED_DOCUMENTS: [&str; 3] =
    ["Repair estimate", "Photos of damage", "Policy copy"];

#[derive(Debug, Clone, Default)]
pub struct DocumentVerifier {
    rules: DocumentRules,
}

impl DocumentVerifier {
    pub fn new(rules: DocumentRules) -> Self {
        Self { rules }
    }

    /// Critical documents first, then standard ones
    pub fn required_for(&self, claim_type: &ClaimType) -> Vec<String> {
        match self.rules.get(claim_type.as_str()) {
            Some(requirement) => requirement
                .critical
                .iter()
                .chain(requirement.standard.iter())
                .cloned()
                .collect(),
            None => GENERIC_REQUIRED_DOCUMENTS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }

    pub fn verify(&self, claim_type: &ClaimType, submitted: &[String]) -> DocumentStatus {
        let required = self.required_for(claim_type);
        let haystack = submitted.join(" ").to_lowercase();

        let missing: Vec<String> = required
            .iter()
            .filter(|doc| !is_present(doc, &haystack))
            .cloned()
            .collect();

        info!(
            required = required.len(),
            submitted = submitted.len(),
            missing = missing.len(),
            "Verified documents"
        );

        DocumentStatus {
            complete: missing.is_empty(),
            required,
            submitted: submitted.to_vec(),
            missing,
        }
    }
}

fn is_present(required: &str, haystack: &str) -> bool {
    required
        .to_lowercase()
        .split_whitespace()
        .take(2)
        .any(|word| haystack.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::DocumentRequirement;
    use std::collections::HashMap;

    fn docs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn generic_list_with_one_estimate() {
        let status = DocumentVerifier::default()
            .verify(&ClaimType::MotorAccident, &docs(&["Repair estimate PDF"]));

        assert_eq!(status.required, docs(&GENERIC_REQUIRED_DOCUMENTS));
        assert_eq!(status.missing, docs(&["Photos of damage", "Policy copy"]));
        assert!(!status.complete);
    }

    #[test]
    fn table_entry_lists_critical_before_standard() {
        let mut rules = HashMap::new();
        rules.insert(
            "health_surgery".to_string(),
            DocumentRequirement {
                critical: docs(&["Discharge summary", "Hospital bills"]),
                standard: docs(&["Prescription"]),
            },
        );
        let verifier = DocumentVerifier::new(DocumentRules::new(rules));

        let status = verifier.verify(
            &ClaimType::HealthSurgery,
            &docs(&["discharge_summary.pdf", "bills.pdf", "prescription.jpg"]),
        );

        assert_eq!(
            status.required,
            docs(&["Discharge summary", "Hospital bills", "Prescription"])
        );
        assert!(status.complete);
    }

    #[test]
    fn loose_match_false_positive() {
        // "policy" in an unrelated file satisfies "Policy copy"
        let status = DocumentVerifier::default().verify(
            &ClaimType::HomeFire,
            &docs(&["repair quote", "photos.zip", "privacy policy notice"]),
        );
        assert!(status.complete);
    }

    #[test]
    fn loose_match_false_negative() {
        // a differently worded file does not satisfy "Photos of damage"
        let status = DocumentVerifier::default().verify(
            &ClaimType::HomeFire,
            &docs(&["Repair estimate", "damage_pictures.jpg", "Policy copy"]),
        );
        assert_eq!(status.missing, docs(&["Photos of damage"]));
    }

    #[test]
    fn nothing_submitted_means_everything_missing() {
        let status = DocumentVerifier::default().verify(&ClaimType::MotorTheft, &[]);
        assert_eq!(status.missing.len(), 3);
        assert!(status.submitted.is_empty());
    }
}
