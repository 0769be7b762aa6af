//! Income aggregator: totals income per source, grossing up net-reported
//! amounts.
//!
//! | Reported as | Gross                          | Withheld         |
//! |-------------|--------------------------------|------------------|
//! | gross       | `amount`                       | `0`              |
//! | net         | `amount / (1 - withholding)`   | `gross - amount` |

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{checked_add, checked_div, checked_sum};
use crate::error::ValidationError;
use crate::models::{IncomeItem, SourceIncome};

/// Totals produced by [`aggregate_income`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeAggregation {
    pub total_income: Decimal,
    pub total_withholding: Decimal,
    /// One entry per source, in ascending `source_id` order.
    pub by_source: Vec<SourceIncome>,
}

/// Grosses up a single net amount.
///
/// # Errors
///
/// Returns [`ValidationError::WithholdingRateOfOne`] when `withholding_rate`
/// is exactly one, or [`ValidationError::AmountOverflow`] when the grossed-up
/// amount does not fit.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::gross_up;
///
/// assert_eq!(gross_up(dec!(320000), dec!(0.20)).unwrap(), dec!(400000));
/// ```
pub fn gross_up(
    net: Decimal,
    withholding_rate: Decimal,
) -> Result<Decimal, ValidationError> {
    if withholding_rate == Decimal::ONE {
        return Err(ValidationError::WithholdingRateOfOne);
    }
    checked_div(net, Decimal::ONE - withholding_rate, "gross income")
}

/// Sums income items by source.
///
/// # Errors
///
/// Returns [`ValidationError::WithholdingRateOfOne`] if any item is reported
/// net and `withholding_rate` is one,
/// [`ValidationError::NegativeIncome`] for a negative amount, or
/// [`ValidationError::AmountOverflow`] when a total does not fit.
pub fn aggregate_income(
    items: &[IncomeItem],
    withholding_rate: Decimal,
) -> Result<IncomeAggregation, ValidationError> {
    let mut by_source: BTreeMap<i64, SourceIncome> = BTreeMap::new();

    for item in items {
        if item.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeIncome {
                source_id: item.source_id,
                amount: item.amount,
            });
        }

        let (gross, withheld) = if item.reported_net {
            let gross = gross_up(item.amount, withholding_rate)?;
            (gross, gross - item.amount)
        } else {
            (item.amount, Decimal::ZERO)
        };

        let entry = by_source
            .entry(item.source_id)
            .or_insert_with(|| SourceIncome {
                source_id: item.source_id,
                reported: Decimal::ZERO,
                gross: Decimal::ZERO,
                withheld: Decimal::ZERO,
            });
        entry.reported = checked_add(entry.reported, item.amount, "reported income")?;
        entry.gross = checked_add(entry.gross, gross, "gross income")?;
        entry.withheld = checked_add(entry.withheld, withheld, "withholding")?;
    }

    let by_source: Vec<SourceIncome> = by_source.into_values().collect();
    let total_income = checked_sum(by_source.iter().map(|s| s.gross), "total income")?;
    let total_withholding =
        checked_sum(by_source.iter().map(|s| s.withheld), "total withholding")?;

    Ok(IncomeAggregation {
        total_income,
        total_withholding,
        by_source,
    })
}
