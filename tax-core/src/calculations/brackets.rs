//! Bracket tax calculator.
//!
//! Walks the bracket table from the lowest tier, taxing the slice of the
//! base that falls inside each tier at that tier's rate. Tier limits are
//! cumulative from zero, so the width of a tier is its limit minus the
//! previous limit.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::calculations::apply_brackets;
//! use tax_core::TaxPolicy;
//!
//! let policy = TaxPolicy::default_for_2025();
//! let result = apply_brackets(dec!(200000), &policy.brackets).unwrap();
//!
//! // 158,000 × 15% + 42,000 × 20%
//! assert_eq!(result.total_tax, dec!(32100));
//! assert_eq!(result.breakdown.len(), 2);
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{checked_add, checked_mul, min};
use crate::error::ValidationError;
use crate::models::{BracketSlice, BracketTable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketTax {
    pub breakdown: Vec<BracketSlice>,
    pub total_tax: Decimal,
}

/// # Errors
///
/// Returns [`ValidationError::BaseExceedsBracketTable`] when every tier is
/// bounded and `tax_base` is above the last limit, or
/// [`ValidationError::AmountOverflow`] when the tax does not fit.
pub fn apply_brackets(
    tax_base: Decimal,
    table: &BracketTable,
) -> Result<BracketTax, ValidationError> {
    if let Some(covered) = table.coverage() {
        if tax_base > covered {
            return Err(ValidationError::BaseExceedsBracketTable {
                base: tax_base,
                covered,
            });
        }
    }

    let mut remaining = tax_base;
    let mut previous_limit = Decimal::ZERO;
    let mut breakdown = Vec::new();
    let mut total_tax = Decimal::ZERO;

    for bracket in table.brackets() {
        let segment = match bracket.upper_limit {
            Some(limit) => min(remaining, limit - previous_limit),
            None => remaining,
        };
        if segment <= Decimal::ZERO {
            break;
        }

        let tax = checked_mul(segment, bracket.rate, "bracket tax")?;
        breakdown.push(BracketSlice {
            rate: bracket.rate,
            base: segment,
            tax,
        });
        total_tax = checked_add(total_tax, tax, "calculated tax")?;
        remaining -= segment;

        match bracket.upper_limit {
            Some(limit) => previous_limit = limit,
            None => break,
        }
        if remaining <= Decimal::ZERO {
            break;
        }
    }

    Ok(BracketTax {
        breakdown,
        total_tax,
    })
}
