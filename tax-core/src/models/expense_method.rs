use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How deductible expense is derived from the income side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseMethod {
    /// Flat share of the income left after the exemption.
    LumpSum,
    /// Recorded general expenses, scaled by the taxable share of income.
    Actual,
}

impl ExpenseMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LumpSum => "lump_sum",
            Self::Actual => "actual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lump_sum" => Some(Self::LumpSum),
            "actual" => Some(Self::Actual),
            _ => None,
        }
    }
}

impl FromStr for ExpenseMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ValidationError::UnknownExpenseMethod(s.to_string()))
    }
}

impl fmt::Display for ExpenseMethod {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
