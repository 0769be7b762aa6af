//! Special deduction capper.
//!
//! Special deductions (health, education, donations, ...) are summed and
//! then limited to a fixed share of the net yield.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{checked_add, checked_mul, floor_zero, min};
use crate::error::ValidationError;
use crate::models::SpecialDeduction;

/// Share of the net yield that special deductions may not exceed.
pub const SPECIAL_DEDUCTION_CAP_RATE: Decimal = dec!(0.10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDeductionCap {
    pub total: Decimal,
    pub cap: Decimal,
    /// `min(total, cap)`.
    pub allowed: Decimal,
    /// `max(0, safi_irat - allowed)`.
    pub tax_base: Decimal,
}

impl SpecialDeductionCap {
    pub fn is_capped(&self) -> bool {
        self.total > self.cap
    }
}

/// # Errors
///
/// Returns [`ValidationError::NegativeSpecialDeduction`] for any negative
/// amount, or [`ValidationError::AmountOverflow`] when the total does not fit.
pub fn cap_special_deductions(
    safi_irat: Decimal,
    deductions: &[SpecialDeduction],
) -> Result<SpecialDeductionCap, ValidationError> {
    let mut total = Decimal::ZERO;
    for deduction in deductions {
        if deduction.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeSpecialDeduction {
                label: deduction.label.clone(),
                amount: deduction.amount,
            });
        }
        total = checked_add(total, deduction.amount, "special deductions")?;
    }

    let cap = checked_mul(safi_irat, SPECIAL_DEDUCTION_CAP_RATE, "special deduction cap")?;
    let allowed = min(total, cap);

    Ok(SpecialDeductionCap {
        total,
        cap,
        allowed,
        tax_base: floor_zero(safi_irat - allowed),
    })
}
