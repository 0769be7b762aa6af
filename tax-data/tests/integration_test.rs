//! Integration tests for transaction import, export and the declaration
//! pipeline against the SQLite backend.

use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use sqlx::sqlite::SqlitePoolOptions;
use tax_core::{
    DeclarationService, DeclarationStatus, DeductionClass, ExpenseMethod, NewSource,
    SpecialDeduction, TaxRepository, Taxpayer, TransactionFilter, TransactionType,
};
use tax_data::{LoadSummary, TransactionExporter, TransactionLoader, TransactionLoaderError};
use tax_db_sqlite::SqliteRepository;

const HOUSEHOLD_CSV_2025: &str = include_str!("../test-data/household_2025.csv");

/// Sets up a test database with migrations run but NO seed data.
async fn setup_test_db_without_seeds() -> SqliteRepository {
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

/// Migrated and seeded store with one taxpayer and the sources the
/// household CSV refers to (all but "Lottery").
async fn setup_test_db() -> (SqliteRepository, Taxpayer) {
    let repo = setup_test_db_without_seeds().await;
    let seeds_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../tax-db-sqlite/seeds");
    repo.run_seeds(&seeds_dir)
        .await
        .expect("Failed to run seeds");

    let taxpayer = repo
        .create_taxpayer("Ayla Demir")
        .await
        .expect("Failed to create taxpayer");

    for source in [
        NewSource::income(taxpayer.id, "Salary", false),
        NewSource::income(taxpayer.id, "Consulting", true),
        NewSource::expense(taxpayer.id, "Office Rent", DeductionClass::General),
        NewSource::expense(taxpayer.id, "Education", DeductionClass::Special),
        NewSource::expense(taxpayer.id, "Groceries", DeductionClass::General),
    ] {
        repo.create_source(source)
            .await
            .expect("Failed to create source");
    }

    (repo, taxpayer)
}

async fn load_household(
    repo: &SqliteRepository,
    taxpayer: &Taxpayer,
) -> LoadSummary {
    let records =
        TransactionLoader::parse(HOUSEHOLD_CSV_2025.as_bytes()).expect("Failed to parse CSV");
    TransactionLoader::load(repo, taxpayer.id, &records)
        .await
        .expect("Failed to load transactions")
}

// ===== loader tests =====

#[tokio::test]
async fn test_load_household_skips_unknown_source() {
    let (repo, taxpayer) = setup_test_db().await;

    let summary = load_household(&repo, &taxpayer).await;

    assert_eq!(
        summary,
        LoadSummary {
            inserted: 7,
            skipped: 1,
        }
    );
}

#[tokio::test]
async fn test_loaded_transactions_keep_date_parts_and_names() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;

    let income = repo
        .list_transactions(&TransactionFilter {
            transaction_type: Some(TransactionType::Income),
            ..TransactionFilter::for_year(2025)
        })
        .await
        .expect("Failed to list income");

    assert_eq!(income.len(), 3);
    let consulting = income
        .iter()
        .find(|t| t.source_name.as_deref() == Some("Consulting"))
        .expect("consulting income loaded");
    assert_eq!(consulting.amount, dec!(320000));
    assert_eq!(consulting.month, Some(6));
    assert_eq!(consulting.day, Some(30));
    assert!(consulting.is_taxable);
    assert_eq!(consulting.payment_method_name.as_deref(), Some("Bank Transfer"));
}

#[tokio::test]
async fn test_load_unknown_taxpayer() {
    let repo = setup_test_db_without_seeds().await;
    let records =
        TransactionLoader::parse(HOUSEHOLD_CSV_2025.as_bytes()).expect("Failed to parse CSV");

    let result = TransactionLoader::load(&repo, 404, &records).await;

    assert!(matches!(result, Err(TransactionLoaderError::TaxpayerNotFound(404))));
}

#[tokio::test]
async fn test_load_without_seeds_fails_before_writing() {
    let repo = setup_test_db_without_seeds().await;
    let taxpayer = repo
        .create_taxpayer("Ayla Demir")
        .await
        .expect("Failed to create taxpayer");
    let records =
        TransactionLoader::parse(HOUSEHOLD_CSV_2025.as_bytes()).expect("Failed to parse CSV");

    let result = TransactionLoader::load(&repo, taxpayer.id, &records).await;

    match result {
        Err(TransactionLoaderError::PaymentMethodNotFound(name)) => {
            assert_eq!(name, "Bank Transfer");
        }
        other => panic!("expected PaymentMethodNotFound, got {other:?}"),
    }
    let stored = repo
        .list_transactions(&TransactionFilter::default())
        .await
        .expect("Failed to list transactions");
    assert!(stored.is_empty());
}

#[tokio::test]
async fn test_load_skips_source_of_other_kind() {
    let (repo, taxpayer) = setup_test_db().await;
    let csv = "date,type,source,payment_method,amount,taxable\n\
               2025-01-01,expense,Salary,Cash,10,true\n\
               2025-01-02,expense,Office Rent,cash,10,true";
    let records = TransactionLoader::parse(csv.as_bytes()).expect("Failed to parse CSV");

    let summary = TransactionLoader::load(&repo, taxpayer.id, &records)
        .await
        .expect("Failed to load");

    assert_eq!(
        summary,
        LoadSummary {
            inserted: 1,
            skipped: 1,
        }
    );
}

// ===== export tests =====

#[tokio::test]
async fn test_export_then_reimport_for_new_taxpayer() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let transactions = repo
        .list_transactions(&TransactionFilter {
            taxpayer_id: Some(taxpayer.id),
            ..TransactionFilter::for_year(2025)
        })
        .await
        .expect("Failed to list transactions");

    let mut buffer = Vec::new();
    let written = TransactionExporter::write(&mut buffer, &transactions).expect("Failed to export");
    assert_eq!(written, 7);

    let records = TransactionLoader::parse(buffer.as_slice()).expect("Failed to parse export");
    let total: rust_decimal::Decimal = records.iter().map(|r| r.amount).sum();
    assert_eq!(total, dec!(760850.40));
}

// ===== declaration pipeline tests =====

#[tokio::test]
async fn test_household_declaration_actual_method() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let service = DeclarationService::new(&repo);

    let result = service
        .calculate(taxpayer.id, 2025, ExpenseMethod::Actual, None)
        .await
        .expect("Failed to calculate declaration");

    assert_eq!(result.total_income, dec!(640000));
    assert_eq!(result.total_withholding, dec!(80000));
    assert_eq!(result.exemption_applied, dec!(47000));
    assert_eq!(result.total_general_expenses, dec!(100000));
    assert_eq!(result.expense_ratio, Some(dec!(0.9265625)));
    assert_eq!(result.deductible_expense, dec!(92656.25));
    assert_eq!(result.safi_irat, dec!(500343.75));
    assert_eq!(result.total_special_deductions, dec!(100000));
    assert_eq!(result.allowed_special_deduction, dec!(50034.375));
    assert_eq!(result.tax_base, dec!(450309.375));
    assert_eq!(result.calculated_tax, dec!(87083.53125));
    assert_eq!(result.net_tax_to_pay, dec!(7083.53125));
    assert!(result.declaration_required);
}

#[tokio::test]
async fn test_household_declaration_lump_sum_method() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let service = DeclarationService::new(&repo);

    let result = service
        .calculate(taxpayer.id, 2025, ExpenseMethod::LumpSum, None)
        .await
        .expect("Failed to calculate declaration");

    assert_eq!(result.deductible_expense, dec!(88950));
    assert_eq!(result.safi_irat, dec!(504050));
    assert_eq!(result.allowed_special_deduction, dec!(50405));
    assert_eq!(result.tax_base, dec!(453645));
    assert_eq!(result.calculated_tax, dec!(87984.15));
    assert_eq!(result.net_tax_to_pay, dec!(7984.15));
}

#[tokio::test]
async fn test_supplied_deductions_replace_store() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let service = DeclarationService::new(&repo);

    let result = service
        .calculate(
            taxpayer.id,
            2025,
            ExpenseMethod::Actual,
            Some(vec![SpecialDeduction::new("Health", dec!(20000))]),
        )
        .await
        .expect("Failed to calculate declaration");

    assert_eq!(result.total_special_deductions, dec!(20000));
    assert_eq!(result.allowed_special_deduction, dec!(20000));
    assert_eq!(result.tax_base, dec!(480343.75));
}

#[tokio::test]
async fn test_save_and_list_declaration() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let service = DeclarationService::new(&repo);
    let result = service
        .calculate(taxpayer.id, 2025, ExpenseMethod::Actual, None)
        .await
        .expect("Failed to calculate declaration");

    service
        .save_declaration("2025 draft", &result, DeclarationStatus::Draft)
        .await
        .expect("Failed to save declaration");

    let saved = service
        .list_declarations(taxpayer.id, 2025)
        .await
        .expect("Failed to list declarations");
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "2025 draft");
    assert_eq!(saved[0].tax_base, dec!(450309.38));
    assert_eq!(saved[0].calculated_tax, dec!(87083.53));
    assert_eq!(saved[0].net_tax_to_pay, dec!(7083.53));
}

#[tokio::test]
async fn test_transaction_summary_for_year() {
    let (repo, taxpayer) = setup_test_db().await;
    load_household(&repo, &taxpayer).await;
    let service = DeclarationService::new(&repo);

    let summary = service
        .transaction_summary(&TransactionFilter::for_year(2025))
        .await
        .expect("Failed to summarize");

    assert_eq!(summary.total_income, dec!(560000));
    assert_eq!(summary.taxable_income, dec!(560000));
    assert_eq!(summary.total_expense, dec!(200850.40));
    assert_eq!(summary.net_income, dec!(359149.60));
}
