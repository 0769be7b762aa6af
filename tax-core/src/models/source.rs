use serde::{Deserialize, Serialize};

use crate::models::{DeductionClass, TransactionType};

/// An income or expense origin owned by a taxpayer (an employer, a rented
/// property, a health provider, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub taxpayer_id: i64,
    pub kind: TransactionType,
    /// Income from this source is recorded after withholding.
    pub is_net: bool,
    pub deduction_class: DeductionClass,
    pub detail: Option<String>,
}

/// For creating new sources (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSource {
    pub name: String,
    pub taxpayer_id: i64,
    pub kind: TransactionType,
    pub is_net: bool,
    pub deduction_class: DeductionClass,
    pub detail: Option<String>,
}

impl NewSource {
    pub fn income(
        taxpayer_id: i64,
        name: impl Into<String>,
        is_net: bool,
    ) -> Self {
        Self {
            name: name.into(),
            taxpayer_id,
            kind: TransactionType::Income,
            is_net,
            deduction_class: DeductionClass::General,
            detail: None,
        }
    }

    pub fn expense(
        taxpayer_id: i64,
        name: impl Into<String>,
        deduction_class: DeductionClass,
    ) -> Self {
        Self {
            name: name.into(),
            taxpayer_id,
            kind: TransactionType::Expense,
            is_net: false,
            deduction_class,
            detail: None,
        }
    }
}
