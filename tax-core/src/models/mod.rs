mod declaration;
mod document;
mod expense_method;
mod items;
mod source;
mod tax_bracket;
mod tax_policy;
mod taxpayer;
mod transaction;

pub use declaration::{
    BracketSlice, Declaration, DeclarationResult, DeclarationStatus, NewDeclaration, SourceIncome,
};
pub use document::{Document, NewDocument};
pub use expense_method::ExpenseMethod;
pub use items::{DeductionClass, ExpenseItem, IncomeItem, SpecialDeduction};
pub use source::{NewSource, Source};
pub use tax_bracket::{BracketTable, TaxBracket};
pub use tax_policy::{DEFAULT_POLICY_YEAR, TaxPolicy};
pub use taxpayer::{PaymentMethod, Taxpayer};
pub use transaction::{
    NewTransaction, Transaction, TransactionFilter, TransactionSummary, TransactionType,
};
