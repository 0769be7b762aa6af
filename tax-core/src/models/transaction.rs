use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a transaction, stored as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_code(&self) -> i64 {
        match self {
            Self::Income => 1,
            Self::Expense => -1,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Income),
            -1 => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" | "1" => Some(Self::Income),
            "expense" | "-1" => Some(Self::Expense),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub taxpayer_id: i64,
    pub transaction_date: NaiveDate,
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub transaction_type: TransactionType,
    pub source_id: Option<i64>,
    pub payment_method_id: i64,
    /// Supporting document, if one is filed.
    pub document_id: Option<i64>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub is_taxable: bool,
    pub tax_item_code: Option<String>,

    // Joined for display; not written back
    pub source_name: Option<String>,
    pub payment_method_name: Option<String>,
    pub document_name: Option<String>,
}

/// For creating new transactions (no id)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTransaction {
    pub taxpayer_id: i64,
    pub transaction_date: NaiveDate,
    pub year: i32,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub transaction_type: TransactionType,
    pub source_id: Option<i64>,
    pub payment_method_id: i64,
    pub document_id: Option<i64>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub is_taxable: bool,
    pub tax_item_code: Option<String>,
}

impl NewTransaction {
    /// A transaction whose year, month and day all come from `date`.
    pub fn on_date(
        taxpayer_id: i64,
        transaction_date: NaiveDate,
        transaction_type: TransactionType,
        source_id: Option<i64>,
        payment_method_id: i64,
        amount: Decimal,
    ) -> Self {
        Self {
            taxpayer_id,
            transaction_date,
            year: transaction_date.year(),
            month: Some(transaction_date.month()),
            day: Some(transaction_date.day()),
            transaction_type,
            source_id,
            payment_method_id,
            document_id: None,
            amount,
            description: None,
            is_taxable: false,
            tax_item_code: None,
        }
    }

    pub fn taxable(mut self) -> Self {
        self.is_taxable = true;
        self
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_document(
        mut self,
        document_id: i64,
    ) -> Self {
        self.document_id = Some(document_id);
        self
    }
}

impl From<&Transaction> for NewTransaction {
    fn from(t: &Transaction) -> Self {
        Self {
            taxpayer_id: t.taxpayer_id,
            transaction_date: t.transaction_date,
            year: t.year,
            month: t.month,
            day: t.day,
            transaction_type: t.transaction_type,
            source_id: t.source_id,
            payment_method_id: t.payment_method_id,
            document_id: t.document_id,
            amount: t.amount,
            description: t.description.clone(),
            is_taxable: t.is_taxable,
            tax_item_code: t.tax_item_code.clone(),
        }
    }
}

/// Criteria for listing transactions. Every field left unset matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub taxpayer_id: Option<i64>,
    pub transaction_type: Option<TransactionType>,
    /// Empty matches every source.
    pub source_ids: Vec<i64>,
    pub is_taxable: Option<bool>,
}

impl TransactionFilter {
    pub fn for_year(year: i32) -> Self {
        Self {
            year: Some(year),
            ..Self::default()
        }
    }
}

/// Totals over a list of transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub total_income: Decimal,
    pub total_expense: Decimal,
    /// Income transactions flagged taxable.
    pub taxable_income: Decimal,
    pub net_income: Decimal,
}

impl TransactionSummary {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        let mut summary = Self::default();

        for t in transactions {
            match t.transaction_type {
                TransactionType::Income => {
                    summary.total_income += t.amount;
                    if t.is_taxable {
                        summary.taxable_income += t.amount;
                    }
                }
                TransactionType::Expense => summary.total_expense += t.amount,
            }
        }

        summary.net_income = summary.total_income - summary.total_expense;
        summary
    }
}
