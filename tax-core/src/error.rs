//! Error taxonomy for declaration calculations.
//!
//! Two families exist. [`ConfigurationError`] means the inputs needed to run
//! a calculation are not on file at all. [`ValidationError`] means they are
//! on file but malformed. Both abort the calculation; no partial result is
//! ever produced.

use rust_decimal::Decimal;
use thiserror::Error;

/// A required tax policy could not be found.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// No tax policy is on file for the requested year, and the year is not
    /// the built-in default year.
    #[error("no tax policy on file for year {0}")]
    NoPolicyForYear(i32),
}

/// Inputs or settings that are present but malformed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The bracket table has no entries.
    #[error("bracket table is empty")]
    EmptyBracketTable,

    /// The bracket table text could not be decoded.
    #[error("bracket table is malformed: {0}")]
    MalformedBracketTable(String),

    /// A bracket upper limit is not strictly greater than its predecessor
    /// (the first limit must be greater than zero).
    #[error("bracket {index} upper limit {limit} must be greater than {previous}")]
    NonIncreasingBracketLimit {
        index: usize,
        limit: Decimal,
        previous: Decimal,
    },

    /// Only the last bracket may omit its upper limit.
    #[error("bracket {index} is unbounded but is not the last bracket")]
    UnboundedBracketNotLast { index: usize },

    /// A bracket rate is outside `[0, 1]`.
    #[error("bracket {index} rate must be between 0 and 1, got {rate}")]
    BracketRateOutOfRange { index: usize, rate: Decimal },

    /// The tax base is larger than the highest bounded bracket limit.
    #[error("tax base {base} exceeds the bracket table coverage of {covered}")]
    BaseExceedsBracketTable { base: Decimal, covered: Decimal },

    /// The expense method name is not recognised.
    #[error("unknown expense method '{0}' (expected 'lump_sum' or 'actual')")]
    UnknownExpenseMethod(String),

    /// A withholding rate of exactly one leaves nothing to gross up from.
    #[error("withholding rate of 1 cannot be used to gross up net income")]
    WithholdingRateOfOne,

    /// The withholding rate must be between 0 and 1.
    #[error("withholding rate must be between 0 and 1, got {0}")]
    WithholdingRateOutOfRange(Decimal),

    /// The lump-sum expense rate must be between 0 and 1.
    #[error("lump-sum rate must be between 0 and 1, got {0}")]
    LumpSumRateOutOfRange(Decimal),

    /// The exemption amount must be non-negative.
    #[error("exemption amount must be non-negative, got {0}")]
    NegativeExemptionAmount(Decimal),

    /// The exemption forfeiture threshold must be non-negative.
    #[error("exemption forfeiture threshold must be non-negative, got {0}")]
    NegativeForfeitureThreshold(Decimal),

    /// The declaration limit must be non-negative.
    #[error("declaration limit must be non-negative, got {0}")]
    NegativeDeclarationLimit(Decimal),

    /// An income item carries a negative amount.
    #[error("income from source {source_id} has negative amount {amount}")]
    NegativeIncome { source_id: i64, amount: Decimal },

    /// An expense item carries a negative amount.
    #[error("expense from source {source_id} has negative amount {amount}")]
    NegativeExpense { source_id: i64, amount: Decimal },

    /// A special deduction carries a negative amount.
    #[error("special deduction '{label}' has negative amount {amount}")]
    NegativeSpecialDeduction { label: String, amount: Decimal },

    /// Amounts too large for the decimal range; `{0}` names the quantity
    /// being computed.
    #[error("amount overflow while computing {0}")]
    AmountOverflow(&'static str),

    /// The policy handed to the engine belongs to another year.
    #[error("policy for year {policy_year} cannot be used for year {requested_year}")]
    PolicyYearMismatch {
        policy_year: i32,
        requested_year: i32,
    },
}

/// Any failure of a declaration calculation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeclarationError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}
