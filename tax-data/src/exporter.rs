use std::io::Write;

use serde::Serialize;
use tax_core::Transaction;
use tax_core::calculations::common::round_half_up;

use crate::loader::TransactionLoaderError;

/// One exported row. The columns are a superset of what
/// [`crate::TransactionLoader::parse`] reads.
#[derive(Debug, Serialize)]
struct ExportRecord<'a> {
    id: i64,
    date: String,
    #[serde(rename = "type")]
    transaction_type: &'static str,
    source: &'a str,
    payment_method: &'a str,
    amount: String,
    taxable: bool,
    description: &'a str,
    tax_item_code: &'a str,
}

impl<'a> From<&'a Transaction> for ExportRecord<'a> {
    fn from(t: &'a Transaction) -> Self {
        Self {
            id: t.id,
            date: t.transaction_date.format("%Y-%m-%d").to_string(),
            transaction_type: t.transaction_type.as_str(),
            source: t.source_name.as_deref().unwrap_or(""),
            payment_method: t.payment_method_name.as_deref().unwrap_or(""),
            amount: format!("{:.2}", round_half_up(t.amount)),
            taxable: t.is_taxable,
            description: t.description.as_deref().unwrap_or(""),
            tax_item_code: t.tax_item_code.as_deref().unwrap_or(""),
        }
    }
}

/// Writes transaction lists as CSV, amounts rounded half-up to cents.
pub struct TransactionExporter;

impl TransactionExporter {
    /// Writes a header and one row per transaction. Returns the number of
    /// rows written.
    pub fn write<W: Write>(
        writer: W,
        transactions: &[Transaction],
    ) -> Result<usize, TransactionLoaderError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        if transactions.is_empty() {
            csv_writer
                .write_record([
                    "id",
                    "date",
                    "type",
                    "source",
                    "payment_method",
                    "amount",
                    "taxable",
                    "description",
                    "tax_item_code",
                ])
                .map_err(|e| TransactionLoaderError::CsvWrite(e.to_string()))?;
        }

        for transaction in transactions {
            csv_writer
                .serialize(ExportRecord::from(transaction))
                .map_err(|e| TransactionLoaderError::CsvWrite(e.to_string()))?;
        }

        csv_writer
            .flush()
            .map_err(|e| TransactionLoaderError::CsvWrite(e.to_string()))?;

        Ok(transactions.len())
    }
}
