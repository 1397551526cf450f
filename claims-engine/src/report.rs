//! Human-readable claim report.
//!
//! Rendering takes whatever sections were evaluated. A section that never ran
//! is printed as not evaluated, so a partially processed claim still gets a
//! complete report.

use chrono::NaiveDateTime;
use std::fmt::{self, Write};
use std::time::Duration;
use tracing::{error, info};

use crate::model::{
    ClaimDetails, ClaimRecord, CoverageLimit, CoverageResult, Decision, DecisionOutcome,
    DocumentStatus, ExclusionEntry, HistoryResult, PayoutBreakdown, PayoutResult,
};

pub const REPORT_TITLE: &str = "===== CLAIM PROCESSING REPORT =====";
pub const PAYABLE_AMOUNT_LABEL: &str = "• PAYABLE AMOUNT: ";
/// Missing documents listed individually
pub const MAX_MISSING_LISTED: usize = 5;

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const NOT_EVALUATED: &str = "• Not evaluated";

/// Rupee amount with thousands separators and no decimals, e.g. `₹1,550,000`
pub fn format_inr(amount: f64) -> String {
    let rounded = if amount.is_finite() { amount.round() } else { 0.0 };
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if rounded < 0.0 {
        format!("-₹{grouped}")
    } else {
        format!("₹{grouped}")
    }
}

/// Inputs to one report. Sections are `None` when they were not evaluated.
#[derive(Debug, Clone)]
pub struct ReportInput<'a> {
    pub claim_id: &'a str,
    pub processed_at: NaiveDateTime,
    pub claim: Option<&'a ClaimRecord>,
    pub coverage: Option<&'a CoverageResult>,
    pub exclusions: Option<&'a [ExclusionEntry]>,
    pub payout: Option<&'a PayoutResult>,
    pub documents: Option<&'a DocumentStatus>,
    pub history: Option<&'a HistoryResult>,
    pub decision: &'a Decision,
    pub processing_time: Duration,
}

/// Never fails: a rendering error yields a short marker report instead.
pub fn generate(input: &ReportInput<'_>) -> String {
    let mut out = String::new();
    match render(&mut out, input) {
        Ok(()) => {
            info!(
                claim_id = %input.claim_id,
                outcome = %input.decision.outcome,
                "Report generated"
            );
            out
        }
        Err(e) => {
            error!(claim_id = %input.claim_id, error = %e, "Report generation failed");
            fallback_report(input.claim_id, input.decision)
        }
    }
}

/// Minimal report used when full rendering is not possible
pub fn fallback_report(claim_id: &str, decision: &Decision) -> String {
    format!(
        "{REPORT_TITLE}\nClaim ID: {claim_id}\nStatus: {}\nReasoning: {}\n\nNote: Full report generation failed. Please review manually.\n",
        decision.outcome, decision.reasoning
    )
}

fn render(out: &mut String, input: &ReportInput<'_>) -> fmt::Result {
    let decision = input.decision;
    writeln!(out, "{REPORT_TITLE}")?;
    writeln!(out, "Claim ID: {}", input.claim_id)?;
    writeln!(
        out,
        "Processing Date: {}",
        input.processed_at.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out, "Status: {}", decision.outcome)?;
    writeln!(out)?;
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out)?;

    render_claim(out, input.claim)?;
    render_coverage(out, input.coverage, input.exclusions)?;
    render_payout(out, input.payout)?;
    render_documents(out, input.documents)?;
    render_history(out, input.history)?;

    writeln!(out)?;
    writeln!(out, "{SEPARATOR}")?;
    writeln!(out, "DECISION: {}", decision.outcome)?;
    writeln!(out, "Reasoning: {}", decision.reasoning)?;

    writeln!(out)?;
    writeln!(out, "NEXT ACTIONS:")?;
    let documents_complete = input.documents.map(|d| d.complete).unwrap_or(false);
    for (i, action) in next_actions(decision.outcome, documents_complete)
        .iter()
        .enumerate()
    {
        writeln!(out, "{}. {}", i + 1, action)?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "Processing Time: {:.2} seconds",
        input.processing_time.as_secs_f64()
    )?;
    writeln!(out, "Processed by: claims-engine")?;
    writeln!(out, "{}", "=".repeat(40))
}

pub fn next_actions(outcome: DecisionOutcome, documents_complete: bool) -> &'static [&'static str] {
    match outcome {
        DecisionOutcome::Approved if !documents_complete => &[
            "Customer to submit missing documents",
            "Schedule surveyor inspection (if required)",
            "Final approval after document verification",
        ],
        DecisionOutcome::Approved => &["Process payment", "Notify customer"],
        DecisionOutcome::Denied => &[
            "Notify customer of denial",
            "Provide appeal process information",
        ],
        DecisionOutcome::Review => &[
            "Forward to claims adjuster for manual review",
            "May require additional investigation",
        ],
    }
}

fn render_claim(out: &mut String, claim: Option<&ClaimRecord>) -> fmt::Result {
    writeln!(out, "CLAIM DETAILS:")?;
    let Some(claim) = claim else {
        return writeln!(out, "{NOT_EVALUATED}");
    };
    writeln!(out, "• Type: {}", claim.claim_type)?;
    writeln!(out, "• Incident Date: {}", or_na(&claim.incident_date))?;
    match &claim.details {
        ClaimDetails::Health {
            hospital_name,
            treatment_type,
            hospitalization_date,
            ..
        } => {
            writeln!(out, "• Hospital: {}", or_na(hospital_name))?;
            writeln!(out, "• Treatment: {}", or_na(treatment_type))?;
            if !hospitalization_date.is_empty() {
                writeln!(out, "• Admission Date: {hospitalization_date}")?;
            }
        }
        ClaimDetails::Motor {
            vehicle_registration,
            damage_description,
            ..
        } => {
            writeln!(out, "• Vehicle: {}", or_na(vehicle_registration))?;
            writeln!(out, "• Damage: {}", or_na(damage_description))?;
        }
        ClaimDetails::Home {
            property_id,
            damage_description,
            ..
        } => {
            writeln!(out, "• Property: {}", or_na(property_id))?;
            writeln!(out, "• Damage: {}", or_na(damage_description))?;
        }
        ClaimDetails::Other => {}
    }
    Ok(())
}

fn render_coverage(
    out: &mut String,
    coverage: Option<&CoverageResult>,
    exclusions: Option<&[ExclusionEntry]>,
) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "COVERAGE VERIFICATION:")?;
    match coverage {
        Some(c) if c.covered => {
            writeln!(out, "✓ Covered under {}", or_na(&c.section))?;
            let limit = match c.coverage_limit {
                CoverageLimit::Amount(amount) => format_inr(amount),
                CoverageLimit::Unbounded => "Unlimited".to_string(),
            };
            writeln!(out, "✓ Coverage Limit: {limit}")?;
        }
        Some(_) => writeln!(out, "✗ Not covered under policy")?,
        None => writeln!(out, "{NOT_EVALUATED}")?,
    }

    let Some(exclusions) = exclusions else {
        return writeln!(out, "• Exclusions not evaluated");
    };
    let applicable: Vec<&ExclusionEntry> = exclusions.iter().filter(|e| e.applies).collect();
    if applicable.is_empty() {
        writeln!(out, "✓ No exclusions apply")
    } else {
        writeln!(out, "✗ Exclusions apply:")?;
        for exclusion in applicable {
            writeln!(out, "  - {}", exclusion.name)?;
        }
        Ok(())
    }
}

fn render_payout(out: &mut String, payout: Option<&PayoutResult>) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "PAYOUT CALCULATION:")?;
    let Some(payout) = payout else {
        return writeln!(out, "{NOT_EVALUATED}");
    };
    match &payout.breakdown {
        PayoutBreakdown::HealthCopay {
            copay_amount,
            copay_percentage,
            ..
        } => {
            writeln!(out, "• Treatment Cost: {}", format_inr(payout.claimed_amount))?;
            writeln!(out, "• Deductible: {}", format_inr(payout.deductible))?;
            writeln!(
                out,
                "• Co-pay: {} ({}% of claim amount)",
                format_inr(*copay_amount),
                copay_percentage
            )?;
        }
        PayoutBreakdown::Depreciation {
            depreciation,
            depreciation_rate,
            zero_depreciation_applied,
        } => {
            writeln!(out, "• Claimed Amount: {}", format_inr(payout.claimed_amount))?;
            writeln!(out, "• Deductible: {}", format_inr(payout.deductible))?;
            if *zero_depreciation_applied {
                writeln!(
                    out,
                    "• Depreciation: {} (Zero Depreciation Cover Active)",
                    format_inr(*depreciation)
                )?;
            } else {
                writeln!(
                    out,
                    "• Depreciation: {} ({}% applied)",
                    format_inr(*depreciation),
                    depreciation_rate
                )?;
            }
        }
    }
    writeln!(out, "{PAYABLE_AMOUNT_LABEL}{}", format_inr(payout.payable_amount))
}

fn render_documents(out: &mut String, documents: Option<&DocumentStatus>) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "DOCUMENT VERIFICATION:")?;
    match documents {
        Some(d) if d.complete => writeln!(out, "✓ All required documents submitted"),
        Some(d) => {
            writeln!(out, "✗ Missing {} document(s):", d.missing.len())?;
            for doc in d.missing.iter().take(MAX_MISSING_LISTED) {
                writeln!(out, "  - {doc}")?;
            }
            Ok(())
        }
        None => writeln!(out, "{NOT_EVALUATED}"),
    }
}

fn render_history(out: &mut String, history: Option<&HistoryResult>) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "CLAIM HISTORY:")?;
    match history {
        Some(h) if h.customer_found => {
            writeln!(
                out,
                "• Customer: {}",
                h.customer_name.as_deref().unwrap_or("N/A")
            )?;
            writeln!(out, "• Past Claims: {}", h.total_claims)?;
            writeln!(out, "• Claim-Free Years: {}", h.claim_free_years)?;
            writeln!(out, "• NCB: {}%", h.ncb_percentage)?;
            if !h.fraud_flags.is_empty() {
                writeln!(out, "• ⚠ Fraud Flags: {}", h.fraud_flags.join(", "))?;
            }
            Ok(())
        }
        Some(_) => writeln!(out, "• New customer (no history found)"),
        None => writeln!(out, "{NOT_EVALUATED}"),
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() { "N/A" } else { value }
}
