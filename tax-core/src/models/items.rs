use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How an expense source is treated by the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionClass {
    /// Deductible in proportion to taxable income under the actual-expense
    /// method.
    General,
    /// Deducted after the net yield, subject to the fixed cap.
    Special,
}

impl DeductionClass {
    pub fn as_code(&self) -> i64 {
        match self {
            Self::General => 0,
            Self::Special => 1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::General),
            1 => Some(Self::Special),
            _ => None,
        }
    }
}

/// One taxable income record as fed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeItem {
    pub source_id: i64,
    pub amount: Decimal,
    /// `true` when `amount` was received after withholding and must be
    /// grossed up.
    pub reported_net: bool,
}

/// One taxable expense record as fed to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseItem {
    pub source_id: i64,
    pub amount: Decimal,
    pub deduction_class: DeductionClass,
}

/// A labelled special deduction, either supplied by the caller or summed
/// from expenses on special sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialDeduction {
    pub label: String,
    pub amount: Decimal,
}

impl SpecialDeduction {
    pub fn new(
        label: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}
