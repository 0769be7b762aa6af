use std::collections::HashMap;
use std::io::Read;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use tax_core::{NewTransaction, RepositoryError, Source, TaxRepository, TransactionType};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when importing or exporting transactions.
#[derive(Debug, Error)]
pub enum TransactionLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("CSV write error: {0}")]
    CsvWrite(String),

    #[error("Line {line}: amount {amount} is negative; record expenses with type 'expense'")]
    NegativeAmount { line: usize, amount: Decimal },

    #[error("Taxpayer {0} not found in database")]
    TaxpayerNotFound(i64),

    #[error("Payment method '{0}' not found in database (have you run the seeds?)")]
    PaymentMethodNotFound(String),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<csv::Error> for TransactionLoaderError {
    fn from(err: csv::Error) -> Self {
        TransactionLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a transactions CSV file.
///
/// | column           | content                                        |
/// |------------------|------------------------------------------------|
/// | `date`           | `YYYY-MM-DD`                                   |
/// | `type`           | `income` / `expense` (or `1` / `-1`)           |
/// | `source`         | source name, empty for none                    |
/// | `payment_method` | payment method name                            |
/// | `amount`         | non-negative amount                            |
/// | `taxable`        | `true`/`false`, `yes`/`no`, `1`/`0`; optional   |
/// | `description`    | optional                                       |
/// | `tax_item_code`  | optional                                       |
///
/// Extra columns (such as the `id` column written by
/// [`crate::TransactionExporter`]) are ignored, so an export can be
/// re-imported.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TransactionRecord {
    pub date: NaiveDate,
    #[serde(rename = "type", deserialize_with = "deserialize_transaction_type")]
    pub transaction_type: TransactionType,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub source: Option<String>,
    pub payment_method: String,
    pub amount: Decimal,
    #[serde(default, deserialize_with = "deserialize_flag")]
    pub taxable: bool,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    pub tax_item_code: Option<String>,
}

fn deserialize_transaction_type<'de, D>(deserializer: D) -> Result<TransactionType, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    TransactionType::parse(&s).ok_or_else(|| {
        serde::de::Error::custom(format!(
            "invalid transaction type '{}', expected 'income' or 'expense'",
            s
        ))
    })
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()))
}

fn deserialize_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s.as_deref().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Ok(false),
        Some("true" | "yes" | "y" | "1") => Ok(true),
        Some("false" | "no" | "n" | "0") => Ok(false),
        Some(other) => Err(serde::de::Error::custom(format!(
            "invalid taxable flag '{}'",
            other
        ))),
    }
}

/// Outcome of [`TransactionLoader::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub inserted: usize,
    /// Records naming an unknown source, or a source of the other kind.
    pub skipped: usize,
}

/// Imports transactions from CSV through the [`TaxRepository`] trait, so it
/// works with any storage backend.
pub struct TransactionLoader;

impl TransactionLoader {
    /// Parse transaction records from a CSV reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<TransactionRecord>, TransactionLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut records = Vec::new();

        for (index, result) in csv_reader.deserialize().enumerate() {
            let record: TransactionRecord = result?;
            if record.amount < Decimal::ZERO {
                return Err(TransactionLoaderError::NegativeAmount {
                    // header is line 1
                    line: index + 2,
                    amount: record.amount,
                });
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Insert `records` as transactions of `taxpayer_id`.
    ///
    /// Source names are matched against the taxpayer's sources and payment
    /// method names against the stored methods, both case-insensitively.
    /// Every payment method is resolved before anything is written, so an
    /// unknown method fails the load without a partial import. A record whose
    /// source is unknown, or whose source is of the other transaction type,
    /// is skipped with a warning.
    pub async fn load<R: TaxRepository + ?Sized>(
        repo: &R,
        taxpayer_id: i64,
        records: &[TransactionRecord],
    ) -> Result<LoadSummary, TransactionLoaderError> {
        repo.get_taxpayer(taxpayer_id).await.map_err(|e| match e {
            RepositoryError::NotFound => TransactionLoaderError::TaxpayerNotFound(taxpayer_id),
            other => TransactionLoaderError::Repository(other),
        })?;

        let methods: HashMap<String, i64> = repo
            .list_payment_methods()
            .await?
            .into_iter()
            .map(|m| (m.method_name.to_lowercase(), m.id))
            .collect();
        let sources: HashMap<String, Source> = repo
            .list_sources(Some(taxpayer_id))
            .await?
            .into_iter()
            .map(|s| (s.name.to_lowercase(), s))
            .collect();

        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            let payment_method_id = methods
                .get(&record.payment_method.to_lowercase())
                .copied()
                .ok_or_else(|| {
                    TransactionLoaderError::PaymentMethodNotFound(record.payment_method.clone())
                })?;
            resolved.push((record, payment_method_id));
        }

        let mut summary = LoadSummary::default();
        for (record, payment_method_id) in resolved {
            let source_id = match &record.source {
                None => None,
                Some(name) => match sources.get(&name.to_lowercase()) {
                    Some(source) if source.kind == record.transaction_type => Some(source.id),
                    Some(source) => {
                        warn!(
                            date = %record.date,
                            source = %source.name,
                            source_kind = source.kind.as_str(),
                            record_kind = record.transaction_type.as_str(),
                            "source type does not match record type, skipping"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                    None => {
                        warn!(
                            date = %record.date,
                            source = %name,
                            taxpayer_id,
                            "unknown source, skipping"
                        );
                        summary.skipped += 1;
                        continue;
                    }
                },
            };

            let transaction = NewTransaction {
                taxpayer_id,
                transaction_date: record.date,
                year: record.date.year(),
                month: Some(record.date.month()),
                day: Some(record.date.day()),
                transaction_type: record.transaction_type,
                source_id,
                payment_method_id,
                document_id: None,
                amount: record.amount,
                description: record.description.clone(),
                is_taxable: record.taxable,
                tax_item_code: record.tax_item_code.clone(),
            };

            repo.create_transaction(transaction).await?;
            summary.inserted += 1;
        }

        debug!(
            taxpayer_id,
            inserted = summary.inserted,
            skipped = summary.skipped,
            "transactions loaded"
        );
        Ok(summary)
    }
}
