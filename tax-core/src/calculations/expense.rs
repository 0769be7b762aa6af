//! Expense deductor.
//!
//! | Method     | Deductible expense                                              |
//! |------------|-----------------------------------------------------------------|
//! | `LumpSum`  | `taxable_after_exemption × lump_sum_rate`                       |
//! | `Actual`   | `Σ general expenses × (taxable_after_exemption / total_income)` |
//!
//! Under `Actual` the ratio is zero when there is no income. Special-class
//! expenses never enter this stage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::{checked_add, checked_mul, floor_zero};
use crate::error::ValidationError;
use crate::models::{DeductionClass, ExpenseItem, ExpenseMethod};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDeduction {
    pub total_general_expenses: Decimal,
    /// `None` under the lump-sum method.
    pub ratio: Option<Decimal>,
    pub deductible: Decimal,
    /// `max(0, taxable_after_exemption - deductible)`.
    pub safi_irat: Decimal,
}

/// Sums the amounts of general-class expense items.
///
/// # Errors
///
/// Returns [`ValidationError::NegativeExpense`] for a negative amount of any
/// class, or [`ValidationError::AmountOverflow`] when the total does not fit.
pub fn total_general_expenses(expenses: &[ExpenseItem]) -> Result<Decimal, ValidationError> {
    let mut total = Decimal::ZERO;

    for item in expenses {
        if item.amount < Decimal::ZERO {
            return Err(ValidationError::NegativeExpense {
                source_id: item.source_id,
                amount: item.amount,
            });
        }
        if item.deduction_class == DeductionClass::General {
            total = checked_add(total, item.amount, "general expenses")?;
        }
    }

    Ok(total)
}

/// Derives the deductible expense and the resulting net yield.
pub fn deduct_expenses(
    method: ExpenseMethod,
    total_income: Decimal,
    taxable_after_exemption: Decimal,
    expenses: &[ExpenseItem],
    lump_sum_rate: Decimal,
) -> Result<ExpenseDeduction, ValidationError> {
    let total_general_expenses = total_general_expenses(expenses)?;

    let (ratio, deductible) = match method {
        ExpenseMethod::LumpSum => (
            None,
            checked_mul(taxable_after_exemption, lump_sum_rate, "lump-sum expense")?,
        ),
        ExpenseMethod::Actual => {
            let ratio = taxable_share(total_income, taxable_after_exemption);
            (
                Some(ratio),
                checked_mul(total_general_expenses, ratio, "actual expense")?,
            )
        }
    };

    Ok(ExpenseDeduction {
        total_general_expenses,
        ratio,
        deductible,
        safi_irat: floor_zero(taxable_after_exemption - deductible),
    })
}

fn taxable_share(
    total_income: Decimal,
    taxable_after_exemption: Decimal,
) -> Decimal {
    if total_income > Decimal::ZERO {
        taxable_after_exemption / total_income
    } else {
        Decimal::ZERO
    }
}
