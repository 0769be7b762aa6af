//! Column readers shared by the row mappers.
//!
//! SQLite has no decimal type. Amounts and rates live in REAL columns, but a
//! value written as a literal integer (a seed file, a hand edit) comes back
//! with INTEGER storage, so [`get_decimal`] accepts both.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};
use tax_core::RepositoryError;

/// Reads a currency or rate column. NULL reads as zero.
pub(crate) fn get_decimal(
    row: &SqliteRow,
    column: &str,
) -> Result<Decimal, RepositoryError> {
    let value_ref = row
        .try_get_raw(column)
        .map_err(|e| RepositoryError::Database(format!("Column '{}' not found: {}", column, e)))?;

    let type_name = value_ref.type_info().name().to_string();

    match type_name.as_str() {
        "INTEGER" => {
            let val: i64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to read INTEGER '{}': {}", column, e))
            })?;
            Ok(Decimal::from(val))
        }
        "REAL" => {
            let val: f64 = row.try_get(column).map_err(|e| {
                RepositoryError::Database(format!("Failed to read REAL '{}': {}", column, e))
            })?;
            Decimal::try_from(val).map_err(|e| {
                RepositoryError::Database(format!("Column '{}' holds {} which is not a decimal: {}", column, val, e))
            })
        }
        "NULL" => Ok(Decimal::ZERO),
        other => Err(RepositoryError::Database(format!(
            "Unexpected type '{}' for column '{}'",
            other, column
        ))),
    }
}

/// Reads a nullable month or day column.
pub(crate) fn get_optional_u32(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<u32>, RepositoryError> {
    let value: Option<i64> = row
        .try_get(column)
        .map_err(|e| RepositoryError::Database(format!("Failed to read '{}': {}", column, e)))?;

    value
        .map(|v| {
            u32::try_from(v).map_err(|_| {
                RepositoryError::Database(format!("Column '{}' holds out-of-range value {}", column, v))
            })
        })
        .transpose()
}

/// Converts an amount for storage in a REAL column.
pub(crate) fn decimal_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}
