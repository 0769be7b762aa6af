use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::calculations::common::round_half_up;
use crate::models::ExpenseMethod;

/// Income subtotal for one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIncome {
    pub source_id: i64,
    /// Sum of the amounts as recorded.
    pub reported: Decimal,
    pub gross: Decimal,
    pub withheld: Decimal,
}

/// The part of the tax base that fell into one bracket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSlice {
    pub rate: Decimal,
    pub base: Decimal,
    pub tax: Decimal,
}

/// Fully itemized outcome of one declaration calculation.
///
/// Values keep full decimal precision. Round with
/// [`round_half_up`] only for display or storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclarationResult {
    pub taxpayer_id: i64,
    pub tax_year: i32,
    pub expense_method: ExpenseMethod,

    // Income
    pub total_income: Decimal,
    pub total_withholding: Decimal,
    pub income_by_source: Vec<SourceIncome>,

    // Exemption
    pub exemption_forfeited: bool,
    pub exemption_applied: Decimal,
    pub taxable_after_exemption: Decimal,

    // Expenses
    pub total_general_expenses: Decimal,
    /// Taxable share of income used to scale actual expenses. `None` under
    /// the lump-sum method.
    pub expense_ratio: Option<Decimal>,
    pub deductible_expense: Decimal,
    /// Net yield after expenses.
    pub safi_irat: Decimal,

    // Special deductions
    pub total_special_deductions: Decimal,
    pub special_deduction_cap: Decimal,
    pub allowed_special_deduction: Decimal,

    // Tax
    pub tax_base: Decimal,
    pub bracket_breakdown: Vec<BracketSlice>,
    pub calculated_tax: Decimal,
    /// Negative means a refund is due.
    pub net_tax_to_pay: Decimal,

    pub declaration_limit: Decimal,
    /// Total income exceeds the filing threshold.
    pub declaration_required: bool,
}

impl DeclarationResult {
    pub fn is_refund(&self) -> bool {
        self.net_tax_to_pay < Decimal::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationStatus {
    Draft,
    Submitted,
}

impl DeclarationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "submitted" => Some(Self::Submitted),
            _ => None,
        }
    }
}

/// A saved declaration snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: i64,
    pub taxpayer_id: i64,
    pub tax_year: i32,
    pub name: String,
    pub expense_method: ExpenseMethod,
    pub total_income: Decimal,
    pub exemption_applied: Decimal,
    pub expense_amount: Decimal,
    pub deductions_amount: Decimal,
    pub tax_base: Decimal,
    pub calculated_tax: Decimal,
    pub withholding_tax: Decimal,
    pub net_tax_to_pay: Decimal,
    pub status: DeclarationStatus,
    pub created_at: DateTime<Utc>,
}

/// For creating new declarations (no id or timestamp)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeclaration {
    pub taxpayer_id: i64,
    pub tax_year: i32,
    pub name: String,
    pub expense_method: ExpenseMethod,
    pub total_income: Decimal,
    pub exemption_applied: Decimal,
    pub expense_amount: Decimal,
    pub deductions_amount: Decimal,
    pub tax_base: Decimal,
    pub calculated_tax: Decimal,
    pub withholding_tax: Decimal,
    pub net_tax_to_pay: Decimal,
    pub status: DeclarationStatus,
}

impl NewDeclaration {
    /// Snapshot of `result`, with every amount rounded half-up to cents.
    pub fn from_result(
        name: impl Into<String>,
        result: &DeclarationResult,
        status: DeclarationStatus,
    ) -> Self {
        Self {
            taxpayer_id: result.taxpayer_id,
            tax_year: result.tax_year,
            name: name.into(),
            expense_method: result.expense_method,
            total_income: round_half_up(result.total_income),
            exemption_applied: round_half_up(result.exemption_applied),
            expense_amount: round_half_up(result.deductible_expense),
            deductions_amount: round_half_up(result.allowed_special_deduction),
            tax_base: round_half_up(result.tax_base),
            calculated_tax: round_half_up(result.calculated_tax),
            withholding_tax: round_half_up(result.total_withholding),
            net_tax_to_pay: round_half_up(result.net_tax_to_pay),
            status,
        }
    }
}
