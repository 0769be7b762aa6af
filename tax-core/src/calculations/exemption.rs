//! Exemption resolver.
//!
//! The exemption is all-or-nothing. When a forfeiture threshold is set
//! (greater than zero) and total gross income exceeds it, no exemption is
//! applied at all; one cent over the threshold loses the whole amount.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::floor_zero;
use crate::models::TaxPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionOutcome {
    pub forfeited: bool,
    pub applied: Decimal,
    /// `max(0, total_income - applied)`.
    pub taxable_after_exemption: Decimal,
}

pub fn resolve_exemption(
    total_income: Decimal,
    policy: &TaxPolicy,
) -> ExemptionOutcome {
    let threshold = policy.exemption_forfeiture_threshold;
    let forfeited = threshold > Decimal::ZERO && total_income > threshold;

    let applied = if forfeited {
        Decimal::ZERO
    } else {
        policy.exemption_amount
    };

    ExemptionOutcome {
        forfeited,
        applied,
        taxable_after_exemption: floor_zero(total_income - applied),
    }
}
