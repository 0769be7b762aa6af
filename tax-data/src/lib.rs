//! CSV import and export of transactions.
//!
//! [`TransactionLoader`] reads the household's own transaction sheets and
//! writes them through any [`tax_core::TaxRepository`]; [`TransactionExporter`]
//! writes a filtered transaction list back out in a compatible layout.

mod exporter;
mod loader;

pub use exporter::TransactionExporter;
pub use loader::{LoadSummary, TransactionLoader, TransactionLoaderError, TransactionRecord};
