use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::models::{BracketTable, TaxBracket};

/// Year whose policy is built in and used when nothing is on file.
pub const DEFAULT_POLICY_YEAR: i32 = 2025;

/// Per-year tax rules consumed by the declaration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    pub tax_year: i32,
    pub exemption_amount: Decimal,
    /// Total gross income above which the exemption is lost. Zero disables the
    /// rule.
    pub exemption_forfeiture_threshold: Decimal,
    /// Filing threshold. Reported on the result, never used in arithmetic.
    pub declaration_limit: Decimal,
    pub lump_sum_rate: Decimal,
    pub withholding_rate: Decimal,
    pub brackets: BracketTable,
}

impl TaxPolicy {
    /// The built-in policy for [`DEFAULT_POLICY_YEAR`].
    pub fn default_for_2025() -> Self {
        let brackets = vec![
            TaxBracket::bounded(dec!(158000), dec!(0.15)),
            TaxBracket::bounded(dec!(380000), dec!(0.20)),
            TaxBracket::bounded(dec!(800000), dec!(0.27)),
            TaxBracket::bounded(dec!(1900000), dec!(0.35)),
            TaxBracket::unbounded(dec!(0.40)),
        ];

        Self {
            tax_year: DEFAULT_POLICY_YEAR,
            exemption_amount: dec!(47000),
            exemption_forfeiture_threshold: Decimal::ZERO,
            declaration_limit: dec!(330000),
            lump_sum_rate: dec!(0.15),
            withholding_rate: dec!(0.20),
            brackets: BracketTable::from_trusted(brackets),
        }
    }

    /// Checks the scalar settings. The bracket table is already validated by
    /// construction.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if:
    /// - `withholding_rate` is exactly 1, or outside `[0, 1]`
    /// - `lump_sum_rate` is outside `[0, 1]`
    /// - `exemption_amount`, `exemption_forfeiture_threshold` or
    ///   `declaration_limit` is negative
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.withholding_rate == Decimal::ONE {
            return Err(ValidationError::WithholdingRateOfOne);
        }
        if self.withholding_rate < Decimal::ZERO || self.withholding_rate > Decimal::ONE {
            return Err(ValidationError::WithholdingRateOutOfRange(
                self.withholding_rate,
            ));
        }
        if self.lump_sum_rate < Decimal::ZERO || self.lump_sum_rate > Decimal::ONE {
            return Err(ValidationError::LumpSumRateOutOfRange(self.lump_sum_rate));
        }
        if self.exemption_amount < Decimal::ZERO {
            return Err(ValidationError::NegativeExemptionAmount(
                self.exemption_amount,
            ));
        }
        if self.exemption_forfeiture_threshold < Decimal::ZERO {
            return Err(ValidationError::NegativeForfeitureThreshold(
                self.exemption_forfeiture_threshold,
            ));
        }
        if self.declaration_limit < Decimal::ZERO {
            return Err(ValidationError::NegativeDeclarationLimit(
                self.declaration_limit,
            ));
        }
        Ok(())
    }
}
