//! Declaration composer: runs every stage in order and assembles the result.
//!
//! # Pipeline
//!
//! | Step | Stage                         | Produces                                   |
//! |------|-------------------------------|--------------------------------------------|
//! | 1    | [`aggregate_income`]          | total income, withholding, per-source rows |
//! | 2    | [`resolve_exemption`]         | applied exemption, taxable after exemption |
//! | 3    | [`deduct_expenses`]           | deductible expense, safi irat              |
//! | 4    | [`cap_special_deductions`]    | allowed special deduction, tax base        |
//! | 5    | [`apply_brackets`]            | per-bracket breakdown, calculated tax      |
//! | 6    | net of withholding            | amount to pay (negative is a refund)       |
//!
//! The policy is validated up front; each stage rejects negative or
//! oversized amounts in its own inputs. A failure at any stage aborts the
//! calculation; no partial result is returned.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tax_core::calculations::{DeclarationInput, DeclarationWorksheet};
//! use tax_core::{DeductionClass, ExpenseItem, ExpenseMethod, IncomeItem, SpecialDeduction, TaxPolicy};
//!
//! let policy = TaxPolicy::default_for_2025();
//! let income = vec![
//!     IncomeItem { source_id: 1, amount: dec!(240000), reported_net: false },
//!     IncomeItem { source_id: 2, amount: dec!(320000), reported_net: true },
//! ];
//! let expenses = vec![
//!     ExpenseItem { source_id: 3, amount: dec!(100000), deduction_class: DeductionClass::General },
//! ];
//! let deductions = vec![SpecialDeduction::new("Health", dec!(100000))];
//!
//! let result = DeclarationWorksheet::new(&policy)
//!     .calculate(&DeclarationInput {
//!         taxpayer_id: 1,
//!         tax_year: 2025,
//!         method: ExpenseMethod::Actual,
//!         income_items: &income,
//!         expense_items: &expenses,
//!         special_deductions: &deductions,
//!     })
//!     .unwrap();
//!
//! assert_eq!(result.tax_base, dec!(450309.375));
//! assert_eq!(result.calculated_tax, dec!(87083.53125));
//! assert_eq!(result.net_tax_to_pay, dec!(7083.53125));
//! ```

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::calculations::brackets::apply_brackets;
use crate::calculations::exemption::resolve_exemption;
use crate::calculations::expense::deduct_expenses;
use crate::calculations::income::aggregate_income;
use crate::calculations::special_deduction::cap_special_deductions;
use crate::error::{DeclarationError, ValidationError};
use crate::models::{
    DeclarationResult, ExpenseItem, ExpenseMethod, IncomeItem, SpecialDeduction, TaxPolicy,
};

/// Everything the engine needs besides the policy.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationInput<'a> {
    pub taxpayer_id: i64,
    pub tax_year: i32,
    pub method: ExpenseMethod,
    pub income_items: &'a [IncomeItem],
    pub expense_items: &'a [ExpenseItem],
    pub special_deductions: &'a [SpecialDeduction],
}

/// Declaration calculator bound to one year's policy.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationWorksheet<'a> {
    policy: &'a TaxPolicy,
}

impl<'a> DeclarationWorksheet<'a> {
    pub fn new(policy: &'a TaxPolicy) -> Self {
        Self { policy }
    }

    /// Runs the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`DeclarationError::Validation`] if the policy does not belong
    /// to `input.tax_year`, the policy is invalid, any amount is negative,
    /// net income is reported under a withholding rate of one, a total
    /// overflows the decimal range, or the tax base is not covered by a fully
    /// bounded bracket table.
    pub fn calculate(
        &self,
        input: &DeclarationInput<'_>,
    ) -> Result<DeclarationResult, DeclarationError> {
        self.validate(input)?;

        let income = aggregate_income(input.income_items, self.policy.withholding_rate)?;
        debug!(
            total_income = %income.total_income,
            total_withholding = %income.total_withholding,
            sources = income.by_source.len(),
            "income aggregated"
        );

        let exemption = resolve_exemption(income.total_income, self.policy);
        if exemption.forfeited {
            warn!(
                total_income = %income.total_income,
                threshold = %self.policy.exemption_forfeiture_threshold,
                "income above forfeiture threshold; exemption not applied"
            );
        }
        debug!(
            exemption_applied = %exemption.applied,
            taxable_after_exemption = %exemption.taxable_after_exemption,
            "exemption resolved"
        );

        let expenses = deduct_expenses(
            input.method,
            income.total_income,
            exemption.taxable_after_exemption,
            input.expense_items,
            self.policy.lump_sum_rate,
        )?;
        debug!(
            method = %input.method,
            deductible_expense = %expenses.deductible,
            safi_irat = %expenses.safi_irat,
            "expenses deducted"
        );

        let special = cap_special_deductions(expenses.safi_irat, input.special_deductions)?;
        if special.is_capped() {
            warn!(
                requested = %special.total,
                allowed = %special.allowed,
                "special deductions exceed cap; excess ignored"
            );
        }
        debug!(tax_base = %special.tax_base, "special deductions applied");

        let brackets = apply_brackets(special.tax_base, &self.policy.brackets)?;
        debug!(
            calculated_tax = %brackets.total_tax,
            tiers = brackets.breakdown.len(),
            "bracket tax calculated"
        );

        let net_tax_to_pay = self.net_tax_to_pay(brackets.total_tax, income.total_withholding);
        if net_tax_to_pay < Decimal::ZERO {
            warn!(refund = %(-net_tax_to_pay), "withholding exceeds calculated tax");
        }

        Ok(DeclarationResult {
            taxpayer_id: input.taxpayer_id,
            tax_year: input.tax_year,
            expense_method: input.method,
            total_income: income.total_income,
            total_withholding: income.total_withholding,
            income_by_source: income.by_source,
            exemption_forfeited: exemption.forfeited,
            exemption_applied: exemption.applied,
            taxable_after_exemption: exemption.taxable_after_exemption,
            total_general_expenses: expenses.total_general_expenses,
            expense_ratio: expenses.ratio,
            deductible_expense: expenses.deductible,
            safi_irat: expenses.safi_irat,
            total_special_deductions: special.total,
            special_deduction_cap: special.cap,
            allowed_special_deduction: special.allowed,
            tax_base: special.tax_base,
            bracket_breakdown: brackets.breakdown,
            calculated_tax: brackets.total_tax,
            net_tax_to_pay,
            declaration_limit: self.policy.declaration_limit,
            declaration_required: income.total_income > self.policy.declaration_limit,
        })
    }

    fn validate(
        &self,
        input: &DeclarationInput<'_>,
    ) -> Result<(), ValidationError> {
        if self.policy.tax_year != input.tax_year {
            return Err(ValidationError::PolicyYearMismatch {
                policy_year: self.policy.tax_year,
                requested_year: input.tax_year,
            });
        }
        self.policy.validate()?;
        Ok(())
    }

    /// No flooring: withholding above the tax yields a negative amount.
    fn net_tax_to_pay(
        &self,
        calculated_tax: Decimal,
        total_withholding: Decimal,
    ) -> Decimal {
        calculated_tax - total_withholding
    }
}

/// Single-call form of [`DeclarationWorksheet::calculate`].
pub fn compute(
    taxpayer_id: i64,
    tax_year: i32,
    method: ExpenseMethod,
    income_items: &[IncomeItem],
    expense_items: &[ExpenseItem],
    special_deductions: &[SpecialDeduction],
    policy: &TaxPolicy,
) -> Result<DeclarationResult, DeclarationError> {
    DeclarationWorksheet::new(policy).calculate(&DeclarationInput {
        taxpayer_id,
        tax_year,
        method,
        income_items,
        expense_items,
        special_deductions,
    })
}
