use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use tax_core::{
    BracketTable, Declaration, DeclarationStatus, DeductionClass, Document, ExpenseItem,
    ExpenseMethod, IncomeItem, NewDeclaration, NewDocument, NewSource, NewTransaction,
    PaymentMethod, RepositoryError, Source, SpecialDeduction, TaxPolicy, TaxRepository, Taxpayer,
    Transaction, TransactionFilter, TransactionType,
};
use tracing::debug;

use crate::columns::{decimal_to_f64, get_decimal, get_optional_u32};

const TRANSACTION_SELECT: &str = "SELECT t.id, t.taxpayer_id, t.transaction_date, t.year,
        t.month, t.day, t.type, t.source_id, t.payment_method_id, t.document_id, t.amount,
        t.description, t.is_taxable, t.tax_item_code,
        s.name AS source_name, p.method_name AS payment_method_name,
        d.display_name AS document_name
     FROM transactions t
     LEFT JOIN sources s ON t.source_id = s.id
     LEFT JOIN payment_methods p ON t.payment_method_id = p.id
     LEFT JOIN documents d ON t.document_id = d.id";

const DOCUMENT_SELECT: &str =
    "SELECT id, doc_ref, display_name, relative_path, gdrive_id, created_at FROM documents";

const SOURCE_SELECT: &str =
    "SELECT id, name, taxpayer_id, type, is_net, deduction_class, detail FROM sources";

const DECLARATION_SELECT: &str = "SELECT id, taxpayer_id, year, name, expense_method,
        total_income, exemption_applied, expense_amount, deductions_amount,
        tax_base, calculated_tax, withholding_tax, net_tax_to_pay, status, created_at
     FROM declarations";

pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Opens `database_url`, creating the file if needed.
    ///
    /// Accepts a bare path (`mtax.db`), a sqlx URL (`sqlite://mtax.db`) or
    /// `:memory:`. An in-memory database lives only as long as its single
    /// pooled connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .foreign_keys(true);

        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to database: {}", database_url))?;

        Ok(Self { pool })
    }

    pub async fn new_with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Load and execute all SQL seed files from the specified directory.
    /// Files are executed in alphabetical order by filename.
    pub async fn run_seeds(
        &self,
        seeds_dir: &Path,
    ) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(seeds_dir)
            .with_context(|| format!("Failed to read seeds directory '{}'", seeds_dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .collect();

        entries.sort_by_key(|entry| entry.file_name());

        for entry in entries {
            let path = entry.path();
            let sql = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read seed file '{}'", path.display()))?;

            sqlx::raw_sql(&sql)
                .execute(&self.pool)
                .await
                .with_context(|| format!("Failed to execute seed file '{}'", path.display()))?;

            debug!(file = %path.display(), "seed file applied");
        }

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn get_payment_method(
        &self,
        id: i64,
    ) -> Result<PaymentMethod, RepositoryError> {
        let row = sqlx::query("SELECT id, method_name FROM payment_methods WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_payment_method(&row)
    }

    async fn get_document(
        &self,
        id: i64,
    ) -> Result<Document, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", DOCUMENT_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_document(&row)
    }

    async fn get_declaration(
        &self,
        id: i64,
    ) -> Result<Declaration, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", DECLARATION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_declaration(&row)
    }
}

fn database_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn column<'r, T>(
    row: &'r SqliteRow,
    name: &str,
) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to read '{}': {}", name, e)))
}

fn transaction_type(code: i64) -> Result<TransactionType, RepositoryError> {
    TransactionType::from_code(code)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid transaction type code: {}", code)))
}

fn row_to_taxpayer(row: &SqliteRow) -> Result<Taxpayer, RepositoryError> {
    Ok(Taxpayer {
        id: column(row, "id")?,
        full_name: column(row, "full_name")?,
    })
}

fn row_to_payment_method(row: &SqliteRow) -> Result<PaymentMethod, RepositoryError> {
    Ok(PaymentMethod {
        id: column(row, "id")?,
        method_name: column(row, "method_name")?,
    })
}

fn deduction_class(code: i64) -> Result<DeductionClass, RepositoryError> {
    DeductionClass::from_code(code)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid deduction class code: {}", code)))
}

fn row_to_source(row: &SqliteRow) -> Result<Source, RepositoryError> {
    Ok(Source {
        id: column(row, "id")?,
        name: column(row, "name")?,
        taxpayer_id: column(row, "taxpayer_id")?,
        kind: transaction_type(column(row, "type")?)?,
        is_net: column(row, "is_net")?,
        deduction_class: deduction_class(column(row, "deduction_class")?)?,
        detail: column(row, "detail")?,
    })
}

fn row_to_document(row: &SqliteRow) -> Result<Document, RepositoryError> {
    Ok(Document {
        id: column(row, "id")?,
        doc_ref: column(row, "doc_ref")?,
        display_name: column(row, "display_name")?,
        relative_path: column(row, "relative_path")?,
        gdrive_id: column(row, "gdrive_id")?,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn row_to_transaction(row: &SqliteRow) -> Result<Transaction, RepositoryError> {
    Ok(Transaction {
        id: column(row, "id")?,
        taxpayer_id: column(row, "taxpayer_id")?,
        transaction_date: column::<NaiveDate>(row, "transaction_date")?,
        year: column(row, "year")?,
        month: get_optional_u32(row, "month")?,
        day: get_optional_u32(row, "day")?,
        transaction_type: transaction_type(column(row, "type")?)?,
        source_id: column(row, "source_id")?,
        payment_method_id: column(row, "payment_method_id")?,
        document_id: column(row, "document_id")?,
        amount: get_decimal(row, "amount")?,
        description: column(row, "description")?,
        is_taxable: column(row, "is_taxable")?,
        tax_item_code: column(row, "tax_item_code")?,
        source_name: column(row, "source_name")?,
        payment_method_name: column(row, "payment_method_name")?,
        document_name: column(row, "document_name")?,
    })
}

fn row_to_income_item(row: &SqliteRow) -> Result<IncomeItem, RepositoryError> {
    Ok(IncomeItem {
        source_id: column(row, "source_id")?,
        amount: get_decimal(row, "amount")?,
        reported_net: column(row, "is_net")?,
    })
}

fn row_to_expense_item(row: &SqliteRow) -> Result<ExpenseItem, RepositoryError> {
    Ok(ExpenseItem {
        source_id: column(row, "source_id")?,
        amount: get_decimal(row, "amount")?,
        deduction_class: deduction_class(column(row, "deduction_class")?)?,
    })
}

fn row_to_special_deduction(row: &SqliteRow) -> Result<SpecialDeduction, RepositoryError> {
    Ok(SpecialDeduction {
        label: column(row, "label")?,
        amount: get_decimal(row, "amount")?,
    })
}

fn row_to_tax_policy(row: &SqliteRow) -> Result<TaxPolicy, RepositoryError> {
    let brackets_json: String = column(row, "tax_brackets")?;
    let brackets = BracketTable::from_json(&brackets_json)?;

    let policy = TaxPolicy {
        tax_year: column(row, "year")?,
        exemption_amount: get_decimal(row, "exemption_amount")?,
        exemption_forfeiture_threshold: get_decimal(row, "exemption_forfeiture_threshold")?,
        declaration_limit: get_decimal(row, "declaration_limit")?,
        lump_sum_rate: get_decimal(row, "lump_sum_rate")?,
        withholding_rate: get_decimal(row, "withholding_rate")?,
        brackets,
    };
    policy.validate()?;

    Ok(policy)
}

fn row_to_declaration(row: &SqliteRow) -> Result<Declaration, RepositoryError> {
    let method: String = column(row, "expense_method")?;
    let expense_method = ExpenseMethod::parse(&method)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid expense method: {}", method)))?;
    let status: String = column(row, "status")?;
    let status = DeclarationStatus::parse(&status)
        .ok_or_else(|| RepositoryError::Database(format!("Invalid declaration status: {}", status)))?;

    Ok(Declaration {
        id: column(row, "id")?,
        taxpayer_id: column(row, "taxpayer_id")?,
        tax_year: column(row, "year")?,
        name: column(row, "name")?,
        expense_method,
        total_income: get_decimal(row, "total_income")?,
        exemption_applied: get_decimal(row, "exemption_applied")?,
        expense_amount: get_decimal(row, "expense_amount")?,
        deductions_amount: get_decimal(row, "deductions_amount")?,
        tax_base: get_decimal(row, "tax_base")?,
        calculated_tax: get_decimal(row, "calculated_tax")?,
        withholding_tax: get_decimal(row, "withholding_tax")?,
        net_tax_to_pay: get_decimal(row, "net_tax_to_pay")?,
        status,
        created_at: column::<DateTime<Utc>>(row, "created_at")?,
    })
}

#[async_trait]
impl TaxRepository for SqliteRepository {
    async fn get_taxpayer(
        &self,
        id: i64,
    ) -> Result<Taxpayer, RepositoryError> {
        let row = sqlx::query("SELECT id, full_name FROM taxpayers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_taxpayer(&row)
    }

    async fn list_taxpayers(&self) -> Result<Vec<Taxpayer>, RepositoryError> {
        let rows = sqlx::query("SELECT id, full_name FROM taxpayers ORDER BY full_name")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(row_to_taxpayer).collect()
    }

    async fn create_taxpayer(
        &self,
        full_name: &str,
    ) -> Result<Taxpayer, RepositoryError> {
        let result = sqlx::query("INSERT INTO taxpayers (full_name) VALUES (?)")
            .bind(full_name)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        self.get_taxpayer(result.last_insert_rowid()).await
    }

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>, RepositoryError> {
        let rows = sqlx::query("SELECT id, method_name FROM payment_methods ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(row_to_payment_method).collect()
    }

    async fn create_payment_method(
        &self,
        method_name: &str,
    ) -> Result<PaymentMethod, RepositoryError> {
        let result = sqlx::query("INSERT INTO payment_methods (method_name) VALUES (?)")
            .bind(method_name)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        self.get_payment_method(result.last_insert_rowid()).await
    }

    async fn get_source(
        &self,
        id: i64,
    ) -> Result<Source, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SOURCE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_source(&row)
    }

    async fn list_sources(
        &self,
        taxpayer_id: Option<i64>,
    ) -> Result<Vec<Source>, RepositoryError> {
        let rows = match taxpayer_id {
            Some(id) => {
                sqlx::query(&format!(
                    "{} WHERE taxpayer_id = ? ORDER BY name",
                    SOURCE_SELECT
                ))
                .bind(id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(&format!("{} ORDER BY taxpayer_id, name", SOURCE_SELECT))
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(database_error)?;

        rows.iter().map(row_to_source).collect()
    }

    async fn create_source(
        &self,
        source: NewSource,
    ) -> Result<Source, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO sources (name, taxpayer_id, type, is_net, deduction_class, detail)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&source.name)
        .bind(source.taxpayer_id)
        .bind(source.kind.as_code())
        .bind(source.is_net)
        .bind(source.deduction_class.as_code())
        .bind(&source.detail)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        self.get_source(result.last_insert_rowid()).await
    }

    async fn get_tax_policy(
        &self,
        year: i32,
    ) -> Result<TaxPolicy, RepositoryError> {
        let row = sqlx::query(
            "SELECT year, exemption_amount, exemption_forfeiture_threshold,
                    declaration_limit, lump_sum_rate, withholding_rate, tax_brackets
             FROM tax_settings WHERE year = ?",
        )
        .bind(year)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?
        .ok_or(RepositoryError::NotFound)?;

        row_to_tax_policy(&row)
    }

    async fn save_tax_policy(
        &self,
        policy: &TaxPolicy,
    ) -> Result<(), RepositoryError> {
        policy.validate()?;
        let brackets_json = policy
            .brackets
            .to_json()
            .map_err(|e| RepositoryError::Database(format!("Failed to encode brackets: {}", e)))?;

        sqlx::query(
            "INSERT INTO tax_settings (
                year, exemption_amount, exemption_forfeiture_threshold,
                declaration_limit, lump_sum_rate, withholding_rate, tax_brackets
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (year) DO UPDATE SET
                exemption_amount = excluded.exemption_amount,
                exemption_forfeiture_threshold = excluded.exemption_forfeiture_threshold,
                declaration_limit = excluded.declaration_limit,
                lump_sum_rate = excluded.lump_sum_rate,
                withholding_rate = excluded.withholding_rate,
                tax_brackets = excluded.tax_brackets",
        )
        .bind(policy.tax_year)
        .bind(decimal_to_f64(policy.exemption_amount))
        .bind(decimal_to_f64(policy.exemption_forfeiture_threshold))
        .bind(decimal_to_f64(policy.declaration_limit))
        .bind(decimal_to_f64(policy.lump_sum_rate))
        .bind(decimal_to_f64(policy.withholding_rate))
        .bind(brackets_json)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(())
    }

    async fn list_policy_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let rows = sqlx::query("SELECT year FROM tax_settings ORDER BY year DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(|row| column::<i32>(row, "year")).collect()
    }

    async fn create_document(
        &self,
        document: NewDocument,
    ) -> Result<Document, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO documents (doc_ref, display_name, relative_path, gdrive_id, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&document.doc_ref)
        .bind(&document.display_name)
        .bind(&document.relative_path)
        .bind(&document.gdrive_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        self.get_document(result.last_insert_rowid()).await
    }

    async fn list_documents(&self) -> Result<Vec<Document>, RepositoryError> {
        let rows = sqlx::query(&format!("{} ORDER BY id", DOCUMENT_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(row_to_document).collect()
    }

    async fn create_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<Transaction, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO transactions (
                taxpayer_id, transaction_date, year, month, day, type, source_id,
                payment_method_id, document_id, amount, description, is_taxable, tax_item_code
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(transaction.taxpayer_id)
        .bind(transaction.transaction_date)
        .bind(transaction.year)
        .bind(transaction.month.map(i64::from))
        .bind(transaction.day.map(i64::from))
        .bind(transaction.transaction_type.as_code())
        .bind(transaction.source_id)
        .bind(transaction.payment_method_id)
        .bind(transaction.document_id)
        .bind(decimal_to_f64(transaction.amount))
        .bind(&transaction.description)
        .bind(transaction.is_taxable)
        .bind(&transaction.tax_item_code)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        self.get_transaction(result.last_insert_rowid()).await
    }

    async fn get_transaction(
        &self,
        id: i64,
    ) -> Result<Transaction, RepositoryError> {
        let row = sqlx::query(&format!("{} WHERE t.id = ?", TRANSACTION_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or(RepositoryError::NotFound)?;

        row_to_transaction(&row)
    }

    async fn update_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE transactions SET
                taxpayer_id = ?, transaction_date = ?, year = ?, month = ?, day = ?,
                type = ?, source_id = ?, payment_method_id = ?, document_id = ?, amount = ?,
                description = ?, is_taxable = ?, tax_item_code = ?
             WHERE id = ?",
        )
        .bind(transaction.taxpayer_id)
        .bind(transaction.transaction_date)
        .bind(transaction.year)
        .bind(transaction.month.map(i64::from))
        .bind(transaction.day.map(i64::from))
        .bind(transaction.transaction_type.as_code())
        .bind(transaction.source_id)
        .bind(transaction.payment_method_id)
        .bind(transaction.document_id)
        .bind(decimal_to_f64(transaction.amount))
        .bind(&transaction.description)
        .bind(transaction.is_taxable)
        .bind(&transaction.tax_item_code)
        .bind(transaction.id)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_transaction(
        &self,
        id: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM transactions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_transactions(
        &self,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>, RepositoryError> {
        let mut query = QueryBuilder::<Sqlite>::new(TRANSACTION_SELECT);
        query.push(" WHERE 1 = 1");

        if let Some(year) = filter.year {
            query.push(" AND t.year = ").push_bind(year);
        }
        if let Some(month) = filter.month {
            query.push(" AND t.month = ").push_bind(i64::from(month));
        }
        if let Some(taxpayer_id) = filter.taxpayer_id {
            query.push(" AND t.taxpayer_id = ").push_bind(taxpayer_id);
        }
        if let Some(kind) = filter.transaction_type {
            query.push(" AND t.type = ").push_bind(kind.as_code());
        }
        if !filter.source_ids.is_empty() {
            query.push(" AND t.source_id IN (");
            let mut ids = query.separated(", ");
            for id in &filter.source_ids {
                ids.push_bind(*id);
            }
            ids.push_unseparated(")");
        }
        if let Some(is_taxable) = filter.is_taxable {
            query.push(" AND t.is_taxable = ").push_bind(is_taxable);
        }
        query.push(" ORDER BY t.transaction_date DESC, t.id DESC");

        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(row_to_transaction).collect()
    }

    async fn list_transaction_years(&self) -> Result<Vec<i32>, RepositoryError> {
        let rows = sqlx::query("SELECT DISTINCT year FROM transactions ORDER BY year DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(database_error)?;

        rows.iter().map(|row| column::<i32>(row, "year")).collect()
    }

    async fn income_items(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<IncomeItem>, RepositoryError> {
        // Unsourced income is reported gross under source 0.
        let rows = sqlx::query(
            "SELECT COALESCE(t.source_id, 0) AS source_id, t.amount,
                    COALESCE(s.is_net, 0) AS is_net
             FROM transactions t
             LEFT JOIN sources s ON t.source_id = s.id
             WHERE t.taxpayer_id = ? AND t.year = ? AND t.type = 1 AND t.is_taxable = 1
             ORDER BY t.id",
        )
        .bind(taxpayer_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(row_to_income_item).collect()
    }

    async fn expense_items(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<ExpenseItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT COALESCE(t.source_id, 0) AS source_id, t.amount,
                    COALESCE(s.deduction_class, 0) AS deduction_class
             FROM transactions t
             LEFT JOIN sources s ON t.source_id = s.id
             WHERE t.taxpayer_id = ? AND t.year = ? AND t.type = -1 AND t.is_taxable = 1
             ORDER BY t.id",
        )
        .bind(taxpayer_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(row_to_expense_item).collect()
    }

    async fn special_deductions(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<SpecialDeduction>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT s.name AS label, SUM(t.amount) AS amount
             FROM transactions t
             JOIN sources s ON t.source_id = s.id
             WHERE t.taxpayer_id = ? AND t.year = ? AND t.type = -1
               AND s.deduction_class = 1
             GROUP BY s.name
             ORDER BY s.name",
        )
        .bind(taxpayer_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(row_to_special_deduction).collect()
    }

    async fn create_declaration(
        &self,
        declaration: NewDeclaration,
    ) -> Result<Declaration, RepositoryError> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO declarations (
                taxpayer_id, year, name, expense_method, total_income,
                exemption_applied, expense_amount, deductions_amount, tax_base,
                calculated_tax, withholding_tax, net_tax_to_pay, status, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(declaration.taxpayer_id)
        .bind(declaration.tax_year)
        .bind(&declaration.name)
        .bind(declaration.expense_method.as_str())
        .bind(decimal_to_f64(declaration.total_income))
        .bind(decimal_to_f64(declaration.exemption_applied))
        .bind(decimal_to_f64(declaration.expense_amount))
        .bind(decimal_to_f64(declaration.deductions_amount))
        .bind(decimal_to_f64(declaration.tax_base))
        .bind(decimal_to_f64(declaration.calculated_tax))
        .bind(decimal_to_f64(declaration.withholding_tax))
        .bind(decimal_to_f64(declaration.net_tax_to_pay))
        .bind(declaration.status.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        self.get_declaration(result.last_insert_rowid()).await
    }

    async fn list_declarations(
        &self,
        taxpayer_id: i64,
        year: i32,
    ) -> Result<Vec<Declaration>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "{} WHERE taxpayer_id = ? AND year = ? ORDER BY created_at DESC, id DESC",
            DECLARATION_SELECT
        ))
        .bind(taxpayer_id)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.iter().map(row_to_declaration).collect()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tax_core::{TaxBracket, ValidationError};

    use super::*;

    async fn setup_test_db() -> SqliteRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        let repo = SqliteRepository::new_with_pool(pool).await;
        repo.run_migrations()
            .await
            .expect("Failed to run migrations");
        repo
    }

    /// A taxpayer, one payment method, and the four sources of the
    /// household scenario: a gross salary, a net-reported contract, a
    /// general expense and a special one.
    struct Fixture {
        taxpayer: Taxpayer,
        method: PaymentMethod,
        salary: Source,
        contract: Source,
        rent: Source,
        donation: Source,
    }

    async fn setup_fixture(repo: &SqliteRepository) -> Fixture {
        let taxpayer = repo
            .create_taxpayer("Ayla Demir")
            .await
            .expect("Failed to create taxpayer");
        let method = repo
            .create_payment_method("Bank Transfer")
            .await
            .expect("Failed to create payment method");
        let salary = repo
            .create_source(NewSource::income(taxpayer.id, "Salary", false))
            .await
            .expect("Failed to create salary source");
        let contract = repo
            .create_source(NewSource::income(taxpayer.id, "Contract", true))
            .await
            .expect("Failed to create contract source");
        let rent = repo
            .create_source(NewSource::expense(taxpayer.id, "Office Rent", DeductionClass::General))
            .await
            .expect("Failed to create rent source");
        let donation = repo
            .create_source(NewSource::expense(taxpayer.id, "Donations", DeductionClass::Special))
            .await
            .expect("Failed to create donation source");

        Fixture {
            taxpayer,
            method,
            salary,
            contract,
            rent,
            donation,
        }
    }

    fn date(
        year: i32,
        month: u32,
        day: u32,
    ) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    async fn add_transaction(
        repo: &SqliteRepository,
        fixture: &Fixture,
        on: NaiveDate,
        kind: TransactionType,
        source: &Source,
        amount: Decimal,
        taxable: bool,
    ) -> Transaction {
        let mut tx = NewTransaction::on_date(
            fixture.taxpayer.id,
            on,
            kind,
            Some(source.id),
            fixture.method.id,
            amount,
        );
        tx.is_taxable = taxable;
        repo.create_transaction(tx)
            .await
            .expect("Failed to create transaction")
    }

    fn custom_policy(year: i32) -> TaxPolicy {
        TaxPolicy {
            tax_year: year,
            exemption_amount: dec!(50000),
            exemption_forfeiture_threshold: dec!(1000000),
            declaration_limit: dec!(300000),
            lump_sum_rate: dec!(0.1),
            withholding_rate: dec!(0.25),
            brackets: BracketTable::new(vec![
                TaxBracket::bounded(dec!(100000), dec!(0.1)),
                TaxBracket::unbounded(dec!(0.3)),
            ])
            .expect("valid table"),
        }
    }

    // ===== taxpayer tests =====

    #[tokio::test]
    async fn test_create_and_get_taxpayer() {
        let repo = setup_test_db().await;

        let created = repo
            .create_taxpayer("Ayla Demir")
            .await
            .expect("Should create taxpayer");
        let fetched = repo
            .get_taxpayer(created.id)
            .await
            .expect("Should find taxpayer");

        assert_eq!(fetched, created);
        assert_eq!(fetched.full_name, "Ayla Demir");
    }

    #[tokio::test]
    async fn test_get_taxpayer_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_taxpayer(999).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_taxpayers_sorted_by_name() {
        let repo = setup_test_db().await;
        repo.create_taxpayer("Zeynep").await.expect("create");
        repo.create_taxpayer("Ali").await.expect("create");

        let names: Vec<_> = repo
            .list_taxpayers()
            .await
            .expect("Should list taxpayers")
            .into_iter()
            .map(|t| t.full_name)
            .collect();

        assert_eq!(names, vec!["Ali".to_string(), "Zeynep".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_taxpayer_name_is_database_error() {
        let repo = setup_test_db().await;
        repo.create_taxpayer("Ali").await.expect("create");

        let result = repo.create_taxpayer("Ali").await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    // ===== payment method tests =====

    #[tokio::test]
    async fn test_create_and_list_payment_methods() {
        let repo = setup_test_db().await;
        repo.create_payment_method("Cash").await.expect("create");
        repo.create_payment_method("Credit Card").await.expect("create");

        let methods = repo
            .list_payment_methods()
            .await
            .expect("Should list payment methods");

        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].method_name, "Cash");
        assert_eq!(methods[1].method_name, "Credit Card");
    }

    // ===== source tests =====

    #[tokio::test]
    async fn test_create_and_get_source() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;

        let contract = repo
            .get_source(fixture.contract.id)
            .await
            .expect("Should find source");

        assert_eq!(contract.name, "Contract");
        assert_eq!(contract.kind, TransactionType::Income);
        assert!(contract.is_net);
        assert_eq!(contract.deduction_class, DeductionClass::General);

        let donation = repo
            .get_source(fixture.donation.id)
            .await
            .expect("Should find source");

        assert_eq!(donation.kind, TransactionType::Expense);
        assert_eq!(donation.deduction_class, DeductionClass::Special);
    }

    #[tokio::test]
    async fn test_get_source_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_source(42).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_sources_per_taxpayer() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let other = repo.create_taxpayer("Other").await.expect("create");
        repo.create_source(NewSource::income(other.id, "Pension", false))
            .await
            .expect("create");

        let own = repo
            .list_sources(Some(fixture.taxpayer.id))
            .await
            .expect("Should list sources");
        let all = repo.list_sources(None).await.expect("Should list sources");

        assert_eq!(own.len(), 4);
        assert_eq!(all.len(), 5);
        assert_eq!(
            own.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Contract", "Donations", "Office Rent", "Salary"]
        );
    }

    // ===== tax policy tests =====

    #[tokio::test]
    async fn test_get_tax_policy_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_tax_policy(2031).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_save_and_get_tax_policy() {
        let repo = setup_test_db().await;
        let policy = custom_policy(2026);

        repo.save_tax_policy(&policy)
            .await
            .expect("Should save policy");
        let loaded = repo
            .get_tax_policy(2026)
            .await
            .expect("Should load policy");

        assert_eq!(loaded, policy);
    }

    #[tokio::test]
    async fn test_save_tax_policy_replaces_existing_year() {
        let repo = setup_test_db().await;
        let mut policy = custom_policy(2026);
        repo.save_tax_policy(&policy).await.expect("save");

        policy.exemption_amount = dec!(60000);
        repo.save_tax_policy(&policy).await.expect("save again");

        let loaded = repo.get_tax_policy(2026).await.expect("load");
        assert_eq!(loaded.exemption_amount, dec!(60000));
        assert_eq!(repo.list_policy_years().await, Ok(vec![2026]));
    }

    #[tokio::test]
    async fn test_save_tax_policy_rejects_invalid_policy() {
        let repo = setup_test_db().await;
        let mut policy = custom_policy(2026);
        policy.withholding_rate = Decimal::ONE;

        let result = repo.save_tax_policy(&policy).await;

        assert_eq!(
            result,
            Err(RepositoryError::InvalidPolicy(ValidationError::WithholdingRateOfOne))
        );
        assert_eq!(repo.list_policy_years().await, Ok(vec![]));
    }

    #[tokio::test]
    async fn test_get_tax_policy_rejects_malformed_brackets() {
        let repo = setup_test_db().await;
        sqlx::query(
            "INSERT INTO tax_settings (
                year, exemption_amount, exemption_forfeiture_threshold, declaration_limit,
                lump_sum_rate, withholding_rate, tax_brackets
            ) VALUES (2027, 47000, 0, 330000, 0.15, 0.20,
                '[{\"limit\":380000,\"rate\":0.2},{\"limit\":158000,\"rate\":0.15}]')",
        )
        .execute(repo.pool())
        .await
        .expect("Failed to insert malformed policy");

        let result = repo.get_tax_policy(2027).await;

        assert!(matches!(
            result,
            Err(RepositoryError::InvalidPolicy(
                ValidationError::NonIncreasingBracketLimit { .. }
            ))
        ));
    }

    #[tokio::test]
    async fn test_get_tax_policy_rejects_unparseable_brackets() {
        let repo = setup_test_db().await;
        sqlx::query(
            "INSERT INTO tax_settings (
                year, exemption_amount, exemption_forfeiture_threshold, declaration_limit,
                lump_sum_rate, withholding_rate, tax_brackets
            ) VALUES (2027, 47000, 0, 330000, 0.15, 0.20, 'not json')",
        )
        .execute(repo.pool())
        .await
        .expect("Failed to insert malformed policy");

        let result = repo.get_tax_policy(2027).await;

        assert!(matches!(
            result,
            Err(RepositoryError::InvalidPolicy(ValidationError::MalformedBracketTable(_)))
        ));
    }

    #[tokio::test]
    async fn test_list_policy_years_newest_first() {
        let repo = setup_test_db().await;
        repo.save_tax_policy(&custom_policy(2024)).await.expect("save");
        repo.save_tax_policy(&custom_policy(2026)).await.expect("save");

        assert_eq!(repo.list_policy_years().await, Ok(vec![2026, 2024]));
    }

    // ===== document tests =====

    #[tokio::test]
    async fn test_create_and_list_documents() {
        let repo = setup_test_db().await;

        let invoice = repo
            .create_document(NewDocument {
                doc_ref: Some("INV-2025-014".to_string()),
                gdrive_id: Some("1AbC".to_string()),
                ..NewDocument::new("Rent invoice", "2025/rent/march.pdf")
            })
            .await
            .expect("Should create document");
        let receipt = repo
            .create_document(NewDocument::new("Tuition receipt", "2025/education.pdf"))
            .await
            .expect("Should create document");

        assert_eq!(invoice.doc_ref.as_deref(), Some("INV-2025-014"));
        assert_eq!(invoice.relative_path, "2025/rent/march.pdf");
        assert_eq!(invoice.gdrive_id.as_deref(), Some("1AbC"));
        assert_eq!(receipt.doc_ref, None);

        let documents = repo.list_documents().await.expect("Should list documents");
        assert_eq!(documents, vec![invoice, receipt]);
    }

    #[tokio::test]
    async fn test_transaction_links_document() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let invoice = repo
            .create_document(NewDocument::new("Rent invoice", "2025/rent/march.pdf"))
            .await
            .expect("Should create document");

        let created = repo
            .create_transaction(
                NewTransaction::on_date(
                    fixture.taxpayer.id,
                    date(2025, 3, 1),
                    TransactionType::Expense,
                    Some(fixture.rent.id),
                    fixture.method.id,
                    dec!(8000),
                )
                .with_document(invoice.id),
            )
            .await
            .expect("Should create transaction");

        assert_eq!(created.document_id, Some(invoice.id));
        assert_eq!(created.document_name.as_deref(), Some("Rent invoice"));

        let mut unlinked = created.clone();
        unlinked.document_id = None;
        repo.update_transaction(&unlinked)
            .await
            .expect("Should update transaction");
        let fetched = repo.get_transaction(created.id).await.expect("fetch");
        assert_eq!(fetched.document_id, None);
        assert_eq!(fetched.document_name, None);
    }

    #[tokio::test]
    async fn test_transaction_with_unknown_document_is_rejected() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;

        let result = repo
            .create_transaction(
                NewTransaction::on_date(
                    fixture.taxpayer.id,
                    date(2025, 3, 1),
                    TransactionType::Expense,
                    Some(fixture.rent.id),
                    fixture.method.id,
                    dec!(8000),
                )
                .with_document(42),
            )
            .await;

        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    // ===== transaction tests =====

    #[tokio::test]
    async fn test_create_and_get_transaction() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;

        let created = repo
            .create_transaction(
                NewTransaction::on_date(
                    fixture.taxpayer.id,
                    date(2025, 3, 14),
                    TransactionType::Income,
                    Some(fixture.salary.id),
                    fixture.method.id,
                    dec!(20000.50),
                )
                .taxable()
                .with_description("March salary"),
            )
            .await
            .expect("Should create transaction");

        let fetched = repo
            .get_transaction(created.id)
            .await
            .expect("Should find transaction");

        assert_eq!(fetched, created);
        assert_eq!(fetched.transaction_date, date(2025, 3, 14));
        assert_eq!(fetched.year, 2025);
        assert_eq!(fetched.month, Some(3));
        assert_eq!(fetched.day, Some(14));
        assert_eq!(fetched.amount, dec!(20000.50));
        assert!(fetched.is_taxable);
        assert_eq!(fetched.description.as_deref(), Some("March salary"));
        assert_eq!(fetched.source_name.as_deref(), Some("Salary"));
        assert_eq!(fetched.payment_method_name.as_deref(), Some("Bank Transfer"));
    }

    #[tokio::test]
    async fn test_get_transaction_not_found() {
        let repo = setup_test_db().await;

        assert_eq!(repo.get_transaction(7).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_transaction() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let mut tx = add_transaction(
            &repo,
            &fixture,
            date(2025, 1, 10),
            TransactionType::Expense,
            &fixture.rent,
            dec!(5000),
            false,
        )
        .await;

        tx.amount = dec!(5500.75);
        tx.is_taxable = true;
        tx.tax_item_code = Some("R-01".to_string());
        repo.update_transaction(&tx)
            .await
            .expect("Should update transaction");

        let fetched = repo.get_transaction(tx.id).await.expect("fetch");
        assert_eq!(fetched.amount, dec!(5500.75));
        assert!(fetched.is_taxable);
        assert_eq!(fetched.tax_item_code.as_deref(), Some("R-01"));
    }

    #[tokio::test]
    async fn test_update_transaction_not_found() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let mut tx = add_transaction(
            &repo,
            &fixture,
            date(2025, 1, 10),
            TransactionType::Expense,
            &fixture.rent,
            dec!(5000),
            false,
        )
        .await;
        tx.id = 9999;

        assert_eq!(repo.update_transaction(&tx).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_transaction() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let tx = add_transaction(
            &repo,
            &fixture,
            date(2025, 1, 10),
            TransactionType::Expense,
            &fixture.rent,
            dec!(5000),
            false,
        )
        .await;

        repo.delete_transaction(tx.id)
            .await
            .expect("Should delete transaction");

        assert_eq!(repo.get_transaction(tx.id).await, Err(RepositoryError::NotFound));
        assert_eq!(repo.delete_transaction(tx.id).await, Err(RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_list_transactions_with_filters() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        add_transaction(&repo, &fixture, date(2024, 12, 31), TransactionType::Income, &fixture.salary, dec!(1000), true).await;
        add_transaction(&repo, &fixture, date(2025, 1, 5), TransactionType::Income, &fixture.salary, dec!(2000), true).await;
        add_transaction(&repo, &fixture, date(2025, 2, 5), TransactionType::Income, &fixture.contract, dec!(3000), false).await;
        add_transaction(&repo, &fixture, date(2025, 2, 9), TransactionType::Expense, &fixture.rent, dec!(400), true).await;

        let year = repo
            .list_transactions(&TransactionFilter::for_year(2025))
            .await
            .expect("Should list transactions");
        assert_eq!(year.len(), 3);
        assert_eq!(year[0].transaction_date, date(2025, 2, 9));

        let february_income = repo
            .list_transactions(&TransactionFilter {
                month: Some(2),
                transaction_type: Some(TransactionType::Income),
                ..TransactionFilter::for_year(2025)
            })
            .await
            .expect("Should list transactions");
        assert_eq!(february_income.len(), 1);
        assert_eq!(february_income[0].amount, dec!(3000));

        let salary_only = repo
            .list_transactions(&TransactionFilter {
                source_ids: vec![fixture.salary.id],
                ..TransactionFilter::default()
            })
            .await
            .expect("Should list transactions");
        assert_eq!(salary_only.len(), 2);

        let taxable = repo
            .list_transactions(&TransactionFilter {
                is_taxable: Some(true),
                taxpayer_id: Some(fixture.taxpayer.id),
                ..TransactionFilter::for_year(2025)
            })
            .await
            .expect("Should list transactions");
        assert_eq!(taxable.len(), 2);
    }

    #[tokio::test]
    async fn test_list_transaction_years_newest_first() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        add_transaction(&repo, &fixture, date(2023, 6, 1), TransactionType::Income, &fixture.salary, dec!(1), true).await;
        add_transaction(&repo, &fixture, date(2025, 6, 1), TransactionType::Income, &fixture.salary, dec!(1), true).await;
        add_transaction(&repo, &fixture, date(2025, 7, 1), TransactionType::Income, &fixture.salary, dec!(1), true).await;

        assert_eq!(repo.list_transaction_years().await, Ok(vec![2025, 2023]));
    }

    // ===== engine feed tests =====

    #[tokio::test]
    async fn test_income_items_carry_net_flag_and_skip_non_taxable() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        add_transaction(&repo, &fixture, date(2025, 1, 31), TransactionType::Income, &fixture.salary, dec!(240000), true).await;
        add_transaction(&repo, &fixture, date(2025, 2, 28), TransactionType::Income, &fixture.contract, dec!(320000), true).await;
        add_transaction(&repo, &fixture, date(2025, 3, 31), TransactionType::Income, &fixture.salary, dec!(999), false).await;
        add_transaction(&repo, &fixture, date(2024, 3, 31), TransactionType::Income, &fixture.salary, dec!(777), true).await;

        let items = repo
            .income_items(fixture.taxpayer.id, 2025)
            .await
            .expect("Should load income items");

        assert_eq!(
            items,
            vec![
                IncomeItem {
                    source_id: fixture.salary.id,
                    amount: dec!(240000),
                    reported_net: false,
                },
                IncomeItem {
                    source_id: fixture.contract.id,
                    amount: dec!(320000),
                    reported_net: true,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_expense_items_carry_deduction_class() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        add_transaction(&repo, &fixture, date(2025, 4, 1), TransactionType::Expense, &fixture.rent, dec!(100000), true).await;
        add_transaction(&repo, &fixture, date(2025, 5, 1), TransactionType::Expense, &fixture.donation, dec!(100000), true).await;

        let items = repo
            .expense_items(fixture.taxpayer.id, 2025)
            .await
            .expect("Should load expense items");

        assert_eq!(
            items,
            vec![
                ExpenseItem {
                    source_id: fixture.rent.id,
                    amount: dec!(100000),
                    deduction_class: DeductionClass::General,
                },
                ExpenseItem {
                    source_id: fixture.donation.id,
                    amount: dec!(100000),
                    deduction_class: DeductionClass::Special,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_special_deductions_summed_per_source() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        let education = repo
            .create_source(NewSource::expense(fixture.taxpayer.id, "Education", DeductionClass::Special))
            .await
            .expect("create");
        add_transaction(&repo, &fixture, date(2025, 4, 1), TransactionType::Expense, &fixture.donation, dec!(60000), true).await;
        add_transaction(&repo, &fixture, date(2025, 6, 1), TransactionType::Expense, &fixture.donation, dec!(40000), false).await;
        add_transaction(&repo, &fixture, date(2025, 6, 2), TransactionType::Expense, &education, dec!(12500.5), true).await;
        add_transaction(&repo, &fixture, date(2025, 6, 3), TransactionType::Expense, &fixture.rent, dec!(9000), true).await;

        let deductions = repo
            .special_deductions(fixture.taxpayer.id, 2025)
            .await
            .expect("Should load special deductions");

        assert_eq!(
            deductions,
            vec![
                SpecialDeduction::new("Donations", dec!(100000)),
                SpecialDeduction::new("Education", dec!(12500.5)),
            ]
        );
    }

    #[tokio::test]
    async fn test_engine_feeds_empty_for_other_taxpayer() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        add_transaction(&repo, &fixture, date(2025, 4, 1), TransactionType::Income, &fixture.salary, dec!(1000), true).await;
        let other = repo.create_taxpayer("Other").await.expect("create");

        assert_eq!(repo.income_items(other.id, 2025).await, Ok(vec![]));
        assert_eq!(repo.expense_items(other.id, 2025).await, Ok(vec![]));
        assert_eq!(repo.special_deductions(other.id, 2025).await, Ok(vec![]));
    }

    // ===== declaration tests =====

    fn new_declaration(
        taxpayer_id: i64,
        name: &str,
    ) -> NewDeclaration {
        NewDeclaration {
            taxpayer_id,
            tax_year: 2025,
            name: name.to_string(),
            expense_method: ExpenseMethod::Actual,
            total_income: dec!(640000),
            exemption_applied: dec!(47000),
            expense_amount: dec!(92656.25),
            deductions_amount: dec!(50034.38),
            tax_base: dec!(450309.38),
            calculated_tax: dec!(87083.53),
            withholding_tax: dec!(80000),
            net_tax_to_pay: dec!(7083.53),
            status: DeclarationStatus::Draft,
        }
    }

    #[tokio::test]
    async fn test_create_declaration_round_trips_amounts() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;

        let saved = repo
            .create_declaration(new_declaration(fixture.taxpayer.id, "First draft"))
            .await
            .expect("Should create declaration");

        assert_eq!(saved.name, "First draft");
        assert_eq!(saved.expense_method, ExpenseMethod::Actual);
        assert_eq!(saved.status, DeclarationStatus::Draft);
        assert_eq!(saved.expense_amount, dec!(92656.25));
        assert_eq!(saved.calculated_tax, dec!(87083.53));
        assert_eq!(saved.net_tax_to_pay, dec!(7083.53));
    }

    #[tokio::test]
    async fn test_list_declarations_for_taxpayer_and_year() {
        let repo = setup_test_db().await;
        let fixture = setup_fixture(&repo).await;
        repo.create_declaration(new_declaration(fixture.taxpayer.id, "A"))
            .await
            .expect("create");
        repo.create_declaration(new_declaration(fixture.taxpayer.id, "B"))
            .await
            .expect("create");
        let mut other_year = new_declaration(fixture.taxpayer.id, "C");
        other_year.tax_year = 2024;
        repo.create_declaration(other_year).await.expect("create");

        let listed = repo
            .list_declarations(fixture.taxpayer.id, 2025)
            .await
            .expect("Should list declarations");

        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "B");
        assert_eq!(listed[1].name, "A");
    }

    // ===== seed tests =====

    #[tokio::test]
    async fn test_run_seeds() {
        let repo = setup_test_db().await;
        let seeds_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("seeds");

        repo.run_seeds(&seeds_dir)
            .await
            .expect("Should run seeds successfully");

        let methods = repo
            .list_payment_methods()
            .await
            .expect("Should list payment methods");
        assert_eq!(methods.len(), 3);

        let policy = repo
            .get_tax_policy(2025)
            .await
            .expect("Should find 2025 policy");
        assert_eq!(policy, TaxPolicy::default_for_2025());
    }

    #[tokio::test]
    async fn test_run_seeds_twice_is_idempotent() {
        let repo = setup_test_db().await;
        let seeds_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("seeds");

        repo.run_seeds(&seeds_dir).await.expect("first run");
        repo.run_seeds(&seeds_dir).await.expect("second run");

        assert_eq!(repo.list_payment_methods().await.map(|m| m.len()), Ok(3));
        assert_eq!(repo.list_policy_years().await, Ok(vec![2025]));
    }

    #[tokio::test]
    async fn test_run_seeds_nonexistent_directory() {
        let repo = setup_test_db().await;

        let result = repo.run_seeds(Path::new("./nonexistent")).await;

        let err = result.expect_err("Should fail for nonexistent directory");
        assert_eq!(
            err.to_string(),
            "Failed to read seeds directory './nonexistent'"
        );
    }

    // ===== connection tests =====

    #[tokio::test]
    async fn test_new_opens_in_memory_database() {
        let repo = SqliteRepository::new(":memory:")
            .await
            .expect("Should open in-memory database");
        repo.run_migrations().await.expect("Should migrate");

        assert_eq!(repo.list_taxpayers().await, Ok(vec![]));
    }
}
