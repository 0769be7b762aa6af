use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// One tier of the progressive rate schedule.
///
/// `upper_limit` is the top of the tier measured from zero. `None` marks the
/// final, unbounded tier. In the stored JSON the field is called `limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBracket {
    #[serde(rename = "limit", with = "rust_decimal::serde::float_option")]
    pub upper_limit: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,
}

impl TaxBracket {
    pub fn bounded(
        upper_limit: Decimal,
        rate: Decimal,
    ) -> Self {
        Self {
            upper_limit: Some(upper_limit),
            rate,
        }
    }

    pub fn unbounded(rate: Decimal) -> Self {
        Self {
            upper_limit: None,
            rate,
        }
    }
}

/// A validated, strictly ordered bracket table.
///
/// Construction always validates, so a `BracketTable` in hand is non-empty,
/// has rates in `[0, 1]`, has strictly increasing positive limits and has at
/// most one unbounded tier, in last position. Deserialization goes through the
/// same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct BracketTable {
    brackets: Vec<TaxBracket>,
}

impl BracketTable {
    /// Validates `brackets` and wraps them.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the table is empty, a rate is outside
    /// `[0, 1]`, a limit does not increase, or an unbounded tier is not last.
    pub fn new(brackets: Vec<TaxBracket>) -> Result<Self, ValidationError> {
        if brackets.is_empty() {
            return Err(ValidationError::EmptyBracketTable);
        }

        let last = brackets.len() - 1;
        let mut previous = Decimal::ZERO;

        for (index, bracket) in brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(ValidationError::BracketRateOutOfRange {
                    index,
                    rate: bracket.rate,
                });
            }

            match bracket.upper_limit {
                Some(limit) if limit <= previous => {
                    return Err(ValidationError::NonIncreasingBracketLimit {
                        index,
                        limit,
                        previous,
                    });
                }
                Some(limit) => previous = limit,
                None if index != last => {
                    return Err(ValidationError::UnboundedBracketNotLast { index });
                }
                None => {}
            }
        }

        Ok(Self { brackets })
    }

    /// Wraps a table known to be valid, such as the built-in default.
    pub(crate) fn from_trusted(brackets: Vec<TaxBracket>) -> Self {
        debug_assert!(Self::new(brackets.clone()).is_ok());
        Self { brackets }
    }

    /// Parses the human-editable JSON encoding used by the settings store:
    /// `[{"limit": 158000, "rate": 0.15}, ..., {"limit": null, "rate": 0.40}]`.
    pub fn from_json(text: &str) -> Result<Self, ValidationError> {
        let brackets: Vec<TaxBracket> = serde_json::from_str(text)
            .map_err(|e| ValidationError::MalformedBracketTable(e.to_string()))?;
        Self::new(brackets)
    }

    /// Encodes the table back into its stored JSON form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.brackets)
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    pub fn len(&self) -> usize {
        self.brackets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brackets.is_empty()
    }

    /// Largest base the table can tax, or `None` when the last tier is
    /// unbounded.
    pub fn coverage(&self) -> Option<Decimal> {
        self.brackets.last().and_then(|b| b.upper_limit)
    }
}

impl TryFrom<Vec<TaxBracket>> for BracketTable {
    type Error = ValidationError;

    fn try_from(brackets: Vec<TaxBracket>) -> Result<Self, Self::Error> {
        Self::new(brackets)
    }
}

impl From<BracketTable> for Vec<TaxBracket> {
    fn from(table: BracketTable) -> Self {
        table.brackets
    }
}
