//! Glue between the repository and the declaration engine.
//!
//! [`DeclarationService`] fetches what the engine needs for one taxpayer and
//! year, resolves the policy and hands everything to
//! [`DeclarationWorksheet`](crate::calculations::DeclarationWorksheet).
//! Async stops here; the engine itself is synchronous.

use thiserror::Error;
use tracing::{debug, info};

use crate::calculations::{compute, resolve_policy};
use crate::db::{RepositoryError, TaxRepository};
use crate::error::DeclarationError;
use crate::models::{
    Declaration, DeclarationResult, DeclarationStatus, ExpenseMethod, NewDeclaration,
    SpecialDeduction, TaxPolicy, TransactionFilter, TransactionSummary,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Declaration(#[from] DeclarationError),
}

pub struct DeclarationService<'a> {
    repo: &'a dyn TaxRepository,
}

impl<'a> DeclarationService<'a> {
    pub fn new(repo: &'a dyn TaxRepository) -> Self {
        Self { repo }
    }

    /// The policy that applies to `year`: the stored one, or the built-in
    /// default for the default year.
    ///
    /// # Errors
    ///
    /// A stored policy that fails validation surfaces as
    /// [`DeclarationError::Validation`], a missing one for a non-default year
    /// as [`DeclarationError::Configuration`].
    pub async fn policy_for_year(
        &self,
        year: i32,
    ) -> Result<TaxPolicy, ServiceError> {
        let stored = match self.repo.get_tax_policy(year).await {
            Ok(policy) => Some(policy),
            Err(RepositoryError::NotFound) => None,
            Err(RepositoryError::InvalidPolicy(e)) => {
                return Err(DeclarationError::Validation(e).into());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(resolve_policy(year, stored)?)
    }

    /// Special deductions derived from expenses on special-class sources.
    pub async fn special_deductions_from_store(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<SpecialDeduction>, ServiceError> {
        Ok(self.repo.special_deductions(taxpayer_id, year).await?)
    }

    /// Calculates a declaration from stored transactions.
    ///
    /// When `deductions` is `None` the special deductions are derived from
    /// the store; `Some(vec![])` means "no special deductions".
    pub async fn calculate(
        &self,
        taxpayer_id: i64,
        year: i32,
        method: ExpenseMethod,
        deductions: Option<Vec<SpecialDeduction>>,
    ) -> Result<DeclarationResult, ServiceError> {
        let policy = self.policy_for_year(year).await?;

        let income_items = self.repo.income_items(taxpayer_id, year).await?;
        let expense_items = self.repo.expense_items(taxpayer_id, year).await?;
        let deductions = match deductions {
            Some(deductions) => deductions,
            None => self.special_deductions_from_store(taxpayer_id, year).await?,
        };
        debug!(
            taxpayer_id,
            year,
            income_items = income_items.len(),
            expense_items = expense_items.len(),
            special_deductions = deductions.len(),
            "inputs loaded"
        );

        let result = compute(
            taxpayer_id,
            year,
            method,
            &income_items,
            &expense_items,
            &deductions,
            &policy,
        )?;

        info!(
            taxpayer_id,
            year,
            method = %method,
            calculated_tax = %result.calculated_tax,
            net_tax_to_pay = %result.net_tax_to_pay,
            "declaration calculated"
        );
        Ok(result)
    }

    pub async fn save_declaration(
        &self,
        name: &str,
        result: &DeclarationResult,
        status: DeclarationStatus,
    ) -> Result<Declaration, ServiceError> {
        let declaration = NewDeclaration::from_result(name, result, status);
        Ok(self.repo.create_declaration(declaration).await?)
    }

    pub async fn list_declarations(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<Declaration>, ServiceError> {
        Ok(self.repo.list_declarations(taxpayer_id, year).await?)
    }

    pub async fn transaction_summary(
        &self,
        filter: &TransactionFilter,
    ) -> Result<TransactionSummary, ServiceError> {
        let transactions = self.repo.list_transactions(filter).await?;
        Ok(TransactionSummary::from_transactions(&transactions))
    }
}
