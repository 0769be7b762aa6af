//! Shared arithmetic helpers for the declaration stages.

use rust_decimal::Decimal;

use crate::error::ValidationError;

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// The engine never rounds intermediate values; this is applied only when a
/// result is displayed or stored.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(87083.53125)), dec!(87083.53));
/// assert_eq!(round_half_up(dec!(50034.375)), dec!(50034.38));
/// assert_eq!(round_half_up(dec!(-0.005)), dec!(-0.01)); // Away from zero
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Returns the larger of two decimal values.
///
/// ```
/// use rust_decimal_macros::dec;
/// use tax_core::calculations::common::max;
///
/// assert_eq!(max(dec!(100.00), dec!(200.00)), dec!(200.00));
/// assert_eq!(max(dec!(-100.00), dec!(-200.00)), dec!(-100.00));
/// ```
pub fn max(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a > b { a } else { b }
}

/// Returns the smaller of two decimal values.
pub fn min(
    a: Decimal,
    b: Decimal,
) -> Decimal {
    if a < b { a } else { b }
}

/// Clamps negative values to zero.
pub fn floor_zero(value: Decimal) -> Decimal {
    max(Decimal::ZERO, value)
}

/// `a + b`, or [`ValidationError::AmountOverflow`] naming `what`.
pub fn checked_add(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, ValidationError> {
    a.checked_add(b).ok_or(ValidationError::AmountOverflow(what))
}

/// `a × b`, or [`ValidationError::AmountOverflow`] naming `what`.
pub fn checked_mul(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, ValidationError> {
    a.checked_mul(b).ok_or(ValidationError::AmountOverflow(what))
}

/// `a / b`, or [`ValidationError::AmountOverflow`] naming `what`. Callers
/// rule out a zero divisor first.
pub fn checked_div(
    a: Decimal,
    b: Decimal,
    what: &'static str,
) -> Result<Decimal, ValidationError> {
    a.checked_div(b).ok_or(ValidationError::AmountOverflow(what))
}

/// Sums `values`, failing on overflow instead of panicking.
pub fn checked_sum<I>(
    values: I,
    what: &'static str,
) -> Result<Decimal, ValidationError>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| checked_add(acc, v, what))
}
