use async_trait::async_trait;
use thiserror::Error;

use crate::error::ValidationError;
use crate::models::{
    Declaration, Document, ExpenseItem, IncomeItem, NewDeclaration, NewDocument, NewSource,
    NewTransaction, PaymentMethod, Source, SpecialDeduction, TaxPolicy, Taxpayer, Transaction, TransactionFilter,
};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored tax policy failed validation when loaded.
    #[error("Invalid stored tax policy: {0}")]
    InvalidPolicy(#[from] ValidationError),
}

#[async_trait]
pub trait TaxRepository: Send + Sync {
    // Taxpayers
    async fn get_taxpayer(&self, id: i64) -> Result<Taxpayer, RepositoryError>;
    async fn list_taxpayers(&self) -> Result<Vec<Taxpayer>, RepositoryError>;
    async fn create_taxpayer(&self, full_name: &str) -> Result<Taxpayer, RepositoryError>;

    // Payment methods
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, RepositoryError>;
    async fn create_payment_method(
        &self,
        method_name: &str,
    ) -> Result<PaymentMethod, RepositoryError>;

    // Sources
    async fn get_source(&self, id: i64) -> Result<Source, RepositoryError>;
    async fn list_sources(
        &self,
        taxpayer_id: Option<i64>,
    ) -> Result<Vec<Source>, RepositoryError>;
    async fn create_source(&self, source: NewSource) -> Result<Source, RepositoryError>;

    // Tax policy
    /// Loads and validates the policy for `year`. `NotFound` if none is on
    /// file.
    async fn get_tax_policy(&self, year: i32) -> Result<TaxPolicy, RepositoryError>;
    /// Inserts or replaces the policy for `policy.tax_year`.
    async fn save_tax_policy(&self, policy: &TaxPolicy) -> Result<(), RepositoryError>;
    async fn list_policy_years(&self) -> Result<Vec<i32>, RepositoryError>;

    // Documents
    async fn create_document(&self, document: NewDocument) -> Result<Document, RepositoryError>;
    async fn list_documents(&self) -> Result<Vec<Document>, RepositoryError>;

    // Transactions
    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError>;

    async fn get_transaction(&self, id: i64) -> Result<Transaction, RepositoryError>;

    async fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<(), RepositoryError>;

    async fn delete_transaction(&self, id: i64) -> Result<(), RepositoryError>;

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, RepositoryError>;

    /// Distinct years with at least one transaction, newest first.
    async fn list_transaction_years(&self) -> Result<Vec<i32>, RepositoryError>;

    // Engine feeds
    /// Taxable income transactions for the taxpayer and year, with the
    /// net-reporting flag of their source.
    async fn income_items(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<IncomeItem>, RepositoryError>;

    /// Taxable expense transactions for the taxpayer and year, with the
    /// deduction class of their source.
    async fn expense_items(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<ExpenseItem>, RepositoryError>;

    /// Expense totals on special-class sources, one entry per source name.
    async fn special_deductions(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<SpecialDeduction>, RepositoryError>;

    // Declarations
    async fn create_declaration(
        &self,
        declaration: NewDeclaration,
    ) -> Result<Declaration, RepositoryError>;

    async fn list_declarations(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<Declaration>, RepositoryError>;
}
