//! Payout arithmetic. Health claims pay after co-pay; motor and home claims
//! pay after depreciation. The deductible comes off last and the result is
//! floored at zero once, after both subtractions.

use tracing::info;

use crate::model::{ClaimType, Domain, PayoutBreakdown, PayoutResult, PolicyRecord};
use crate::tables::DepreciationTable;

pub const DEFAULT_DEDUCTIBLE: f64 = 2_000.0;
pub const DEFAULT_COPAY_PERCENTAGE: f64 = 10.0;
pub const DEFAULT_ROOM_RENT_LIMIT: f64 = 5_000.0;

fn non_negative(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}

fn percentage(value: f64) -> f64 {
    non_negative(value).min(100.0)
}

#[derive(Debug, Clone, Default)]
pub struct PayoutCalculator {
    depreciation: DepreciationTable,
}

impl PayoutCalculator {
    pub fn new(depreciation: DepreciationTable) -> Self {
        Self { depreciation }
    }

    pub fn calculate(
        &self,
        claim_amount: f64,
        policy: &PolicyRecord,
        claim_type: &ClaimType,
        vehicle_age_years: f64,
    ) -> PayoutResult {
        let claimed = non_negative(claim_amount);
        let deductible = non_negative(policy.deductible.unwrap_or(DEFAULT_DEDUCTIBLE));

        let (reduction, breakdown) = match claim_type.domain() {
            Domain::Health => {
                let copay_percentage =
                    percentage(policy.copay_percentage.unwrap_or(DEFAULT_COPAY_PERCENTAGE));
                let copay_amount = claimed * copay_percentage / 100.0;
                (
                    copay_amount,
                    PayoutBreakdown::HealthCopay {
                        copay_amount,
                        copay_percentage,
                        room_rent_limit: non_negative(
                            policy.room_rent_limit.unwrap_or(DEFAULT_ROOM_RENT_LIMIT),
                        ),
                    },
                )
            }
            domain => {
                let zero_depreciation = policy.zero_depreciation.unwrap_or(false);
                let rate = if zero_depreciation {
                    0.0
                } else {
                    match domain {
                        Domain::Motor => self.depreciation.motor_rate(vehicle_age_years),
                        Domain::Home => self.depreciation.home_rate(),
                        _ => 0.0,
                    }
                };
                let rate = percentage(rate);
                let depreciation = claimed * rate / 100.0;
                (
                    depreciation,
                    PayoutBreakdown::Depreciation {
                        depreciation,
                        depreciation_rate: rate,
                        zero_depreciation_applied: zero_depreciation,
                    },
                )
            }
        };

        let payable_amount = (claimed - reduction - deductible).max(0.0);

        info!(
            claim_type = %claim_type,
            claimed,
            deductible,
            reduction,
            payable = payable_amount,
            "Calculated payout"
        );

        PayoutResult {
            claimed_amount: claimed,
            deductible,
            breakdown,
            payable_amount,
        }
    }
}
