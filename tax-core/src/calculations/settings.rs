//! Settings resolver: picks the tax policy that applies to a fiscal year.

use tracing::debug;

use crate::error::{ConfigurationError, DeclarationError, ValidationError};
use crate::models::{DEFAULT_POLICY_YEAR, TaxPolicy};

/// Returns the policy to use for `year`.
///
/// `stored` is whatever the settings store holds for that year. When nothing
/// is stored only [`DEFAULT_POLICY_YEAR`] falls back to the built-in policy;
/// any other year is a configuration error.
///
/// # Errors
///
/// - [`ConfigurationError::NoPolicyForYear`] if nothing is stored and `year`
///   is not the default year.
/// - [`ValidationError::PolicyYearMismatch`] if `stored` belongs to another
///   year.
/// - Any [`ValidationError`] from [`TaxPolicy::validate`].
///
/// # Example
///
/// ```
/// use tax_core::calculations::resolve_policy;
/// use tax_core::{ConfigurationError, DeclarationError};
///
/// let policy = resolve_policy(2025, None).unwrap();
/// assert_eq!(policy.tax_year, 2025);
///
/// assert_eq!(
///     resolve_policy(2019, None),
///     Err(DeclarationError::Configuration(ConfigurationError::NoPolicyForYear(2019)))
/// );
/// ```
pub fn resolve_policy(
    year: i32,
    stored: Option<TaxPolicy>,
) -> Result<TaxPolicy, DeclarationError> {
    let policy = match stored {
        Some(policy) => {
            if policy.tax_year != year {
                return Err(ValidationError::PolicyYearMismatch {
                    policy_year: policy.tax_year,
                    requested_year: year,
                }
                .into());
            }
            policy
        }
        None if year == DEFAULT_POLICY_YEAR => {
            debug!(year, "no stored policy; using built-in default");
            TaxPolicy::default_for_2025()
        }
        None => return Err(ConfigurationError::NoPolicyForYear(year).into()),
    };

    policy.validate()?;
    Ok(policy)
}
