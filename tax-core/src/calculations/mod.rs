//! Declaration calculation stages.
//!
//! Each stage is a pure function of its inputs. [`DeclarationWorksheet`]
//! chains them in order; the stage functions are public so callers can
//! inspect one step in isolation.

pub mod brackets;
pub mod common;
pub mod declaration;
pub mod exemption;
pub mod expense;
pub mod income;
pub mod settings;
pub mod special_deduction;

pub use brackets::{BracketTax, apply_brackets};
pub use declaration::{DeclarationInput, DeclarationWorksheet, compute};
pub use exemption::{ExemptionOutcome, resolve_exemption};
pub use expense::{ExpenseDeduction, deduct_expenses, total_general_expenses};
pub use income::{IncomeAggregation, aggregate_income, gross_up};
pub use settings::resolve_policy;
pub use special_deduction::{
    SPECIAL_DEDUCTION_CAP_RATE, SpecialDeductionCap, cap_special_deductions,
};
