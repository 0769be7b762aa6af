//! Command handlers.
//!
//! Handlers take an open repository and a writer so they run the same
//! against a file database, an in-memory one or a test buffer.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Datelike;
use rust_decimal::Decimal;
use tax_core::db::{DbConfig, RepositoryRegistry};
use tax_core::{
    BracketTable, ConfigurationError, DeclarationError, DeclarationService, DeclarationStatus,
    DeductionClass, NewDocument, NewSource, NewTransaction, PaymentMethod, RepositoryError,
    ServiceError, Source, TaxPolicy, TaxRepository, Taxpayer, Transaction, TransactionFilter,
    TransactionType,
};
use tax_data::{TransactionExporter, TransactionLoader};
use tax_db_sqlite::SqliteRepositoryFactory;
use tracing::{info, warn};

use crate::cli::{
    AddDocumentArgs, AddSourceArgs, AddTransactionArgs, CalculateArgs, Command,
    DeclarationCommand, DocumentCommand, FilterArgs, PaymentMethodCommand, SetPolicyArgs,
    SettingsCommand, SourceCommand, TaxpayerCommand, TransactionCommand, UpdateTransactionArgs,
};
use crate::output;

/// Registry with every backend this binary ships.
pub fn build_registry() -> RepositoryRegistry {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));
    registry
}

/// Opens the configured store. Opening migrates the schema and applies the
/// seed data.
pub async fn open_repository(config: &DbConfig) -> Result<Box<dyn TaxRepository>> {
    build_registry().create(config).await.with_context(|| {
        format!(
            "Failed to open {} store at {}",
            config.backend, config.connection_string
        )
    })
}

/// Finds a taxpayer by numeric id, or by full name ignoring ASCII case.
pub async fn resolve_taxpayer(
    repo: &dyn TaxRepository,
    key: &str,
) -> Result<Taxpayer> {
    let key = key.trim();
    let taxpayers = repo
        .list_taxpayers()
        .await
        .context("Failed to list taxpayers")?;

    let found = match key.parse::<i64>() {
        Ok(id) => taxpayers.into_iter().find(|t| t.id == id),
        Err(_) => taxpayers
            .into_iter()
            .find(|t| t.full_name.eq_ignore_ascii_case(key)),
    };

    match found {
        Some(taxpayer) => Ok(taxpayer),
        None => bail!("Taxpayer '{}' not found", key),
    }
}

/// Runs one command. `docs_root` is where stored document paths resolve.
pub async fn run<W: Write>(
    command: Command,
    repo: &dyn TaxRepository,
    docs_root: &Path,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Init => {
            let years = repo.list_policy_years().await?;
            let methods = repo.list_payment_methods().await?;
            writeln!(
                out,
                "Store ready: {} payment method(s), policies for {:?}.",
                methods.len(),
                years
            )?;
            Ok(())
        }
        Command::Taxpayers(cmd) => taxpayers(cmd, repo, out).await,
        Command::Sources(cmd) => sources(cmd, repo, out).await,
        Command::PaymentMethods(cmd) => payment_methods(cmd, repo, out).await,
        Command::Calculate(args) => calculate(args, repo, out).await,
        Command::Settings(cmd) => settings(cmd, repo, out).await,
        Command::Transactions(cmd) => transactions(cmd, repo, out).await,
        Command::Documents(cmd) => documents(cmd, repo, docs_root, out).await,
        Command::Declarations(cmd) => declarations(cmd, repo, out).await,
    }
}

/// Finds a source of `taxpayer_id` by id or name (ASCII case ignored) and
/// checks that it records `kind` transactions.
async fn resolve_source(
    repo: &dyn TaxRepository,
    taxpayer_id: i64,
    kind: TransactionType,
    key: &str,
) -> Result<Source> {
    let key = key.trim();
    let source = match key.parse::<i64>() {
        Ok(id) => match repo.get_source(id).await {
            Ok(source) => source,
            Err(RepositoryError::NotFound) => bail!("Source #{} not found", id),
            Err(e) => return Err(e.into()),
        },
        Err(_) => repo
            .list_sources(Some(taxpayer_id))
            .await?
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(key))
            .with_context(|| format!("Source '{}' not found", key))?,
    };

    if source.taxpayer_id != taxpayer_id {
        bail!(
            "Source '{}' belongs to taxpayer #{}, not #{}",
            source.name,
            source.taxpayer_id,
            taxpayer_id
        );
    }
    if source.kind != kind {
        bail!(
            "Source '{}' records {} transactions, not {}",
            source.name,
            source.kind.as_str(),
            kind.as_str()
        );
    }
    Ok(source)
}

/// Finds a payment method by id or name, ignoring ASCII case.
async fn resolve_payment_method(
    repo: &dyn TaxRepository,
    key: &str,
) -> Result<PaymentMethod> {
    let key = key.trim();
    let methods = repo.list_payment_methods().await?;

    let found = match key.parse::<i64>() {
        Ok(id) => methods.into_iter().find(|m| m.id == id),
        Err(_) => methods
            .into_iter()
            .find(|m| m.method_name.eq_ignore_ascii_case(key)),
    };
    found.with_context(|| format!("Payment method '{}' not found", key))
}

async fn ensure_document(
    repo: &dyn TaxRepository,
    id: i64,
) -> Result<()> {
    let documents = repo.list_documents().await?;
    if !documents.iter().any(|d| d.id == id) {
        bail!("Document #{} not found", id);
    }
    Ok(())
}

async fn fetch_transaction(
    repo: &dyn TaxRepository,
    id: i64,
) -> Result<Transaction> {
    match repo.get_transaction(id).await {
        Ok(transaction) => Ok(transaction),
        Err(RepositoryError::NotFound) => bail!("Transaction #{} not found", id),
        Err(e) => Err(e.into()),
    }
}

fn check_amount(amount: Decimal) -> Result<()> {
    if amount < Decimal::ZERO {
        bail!(
            "Amount {} is negative; record expenses with --type expense",
            amount
        );
    }
    Ok(())
}

/// Trimmed text, or `None` when blank so an empty flag clears the field.
fn text_update(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

async fn taxpayers<W: Write>(
    cmd: TaxpayerCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    match cmd {
        TaxpayerCommand::List => {
            let taxpayers = repo.list_taxpayers().await?;
            output::write_taxpayers(out, &taxpayers)?;
        }
        TaxpayerCommand::Add { name } => {
            let taxpayer = repo
                .create_taxpayer(name.trim())
                .await
                .with_context(|| format!("Failed to add taxpayer '{}'", name))?;
            writeln!(out, "Added taxpayer #{} {}", taxpayer.id, taxpayer.full_name)?;
        }
    }
    Ok(())
}

async fn sources<W: Write>(
    cmd: SourceCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    match cmd {
        SourceCommand::List { taxpayer } => {
            let taxpayer_id = match taxpayer {
                Some(key) => Some(resolve_taxpayer(repo, &key).await?.id),
                None => None,
            };
            let sources = repo.list_sources(taxpayer_id).await?;
            output::write_sources(out, &sources)?;
        }
        SourceCommand::Add(args) => add_source(args, repo, out).await?,
    }
    Ok(())
}

async fn add_source<W: Write>(
    args: AddSourceArgs,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    let taxpayer = resolve_taxpayer(repo, &args.taxpayer).await?;

    let source = NewSource {
        name: args.name.trim().to_string(),
        taxpayer_id: taxpayer.id,
        kind: args.kind,
        is_net: args.net,
        deduction_class: if args.special {
            DeductionClass::Special
        } else {
            DeductionClass::General
        },
        detail: args.detail,
    };

    let source = repo
        .create_source(source)
        .await
        .with_context(|| format!("Failed to add source '{}'", args.name))?;
    writeln!(
        out,
        "Added {} source #{} {} for {}",
        source.kind.as_str(),
        source.id,
        source.name,
        taxpayer.full_name
    )?;
    Ok(())
}

async fn payment_methods<W: Write>(
    cmd: PaymentMethodCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    match cmd {
        PaymentMethodCommand::List => {
            let methods = repo.list_payment_methods().await?;
            output::write_payment_methods(out, &methods)?;
        }
        PaymentMethodCommand::Add { name } => {
            let method = repo
                .create_payment_method(name.trim())
                .await
                .with_context(|| format!("Failed to add payment method '{}'", name))?;
            writeln!(
                out,
                "Added payment method #{} {}",
                method.id, method.method_name
            )?;
        }
    }
    Ok(())
}

async fn calculate<W: Write>(
    args: CalculateArgs,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    let taxpayer = resolve_taxpayer(repo, &args.taxpayer).await?;
    let service = DeclarationService::new(repo);

    let deductions = if args.deductions.is_empty() {
        None
    } else {
        Some(args.deductions)
    };

    let result = service
        .calculate(taxpayer.id, args.year, args.method, deductions)
        .await
        .with_context(|| {
            format!(
                "Failed to calculate {} declaration for {}",
                args.year, taxpayer.full_name
            )
        })?;

    if args.json {
        output::write_json(out, &result)?;
    } else {
        output::write_declaration(out, &taxpayer, &result)?;
    }

    if let Some(name) = args.save {
        let status = if args.submitted {
            DeclarationStatus::Submitted
        } else {
            DeclarationStatus::Draft
        };
        let saved = service.save_declaration(&name, &result, status).await?;
        info!(
            id = saved.id,
            name = %saved.name,
            status = saved.status.as_str(),
            "declaration saved"
        );
        if !args.json {
            writeln!(
                out,
                "Saved declaration #{} '{}' ({}).",
                saved.id,
                saved.name,
                saved.status.as_str()
            )?;
        }
    }

    Ok(())
}

async fn settings<W: Write>(
    cmd: SettingsCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    let service = DeclarationService::new(repo);

    match cmd {
        SettingsCommand::Show { year, json } => {
            let policy = service.policy_for_year(year).await?;
            if json {
                output::write_json(out, &policy)?;
            } else {
                output::write_policy(out, &policy)?;
            }
        }
        SettingsCommand::Set(args) => {
            let policy = policy_with_overrides(&service, args).await?;
            repo.save_tax_policy(&policy)
                .await
                .with_context(|| format!("Failed to store the {} policy", policy.tax_year))?;
            info!(year = policy.tax_year, "tax policy stored");
            output::write_policy(out, &policy)?;
        }
        SettingsCommand::Years => {
            let years = repo.list_policy_years().await?;
            if years.is_empty() {
                writeln!(out, "No stored policies.")?;
            }
            for year in years {
                writeln!(out, "{}", year)?;
            }
        }
    }
    Ok(())
}

/// The policy in effect for `args.year`, with every supplied value replaced.
/// A year with nothing on file, or with a stored policy that no longer
/// validates, starts from the built-in default.
async fn policy_with_overrides(
    service: &DeclarationService<'_>,
    args: SetPolicyArgs,
) -> Result<TaxPolicy> {
    let mut policy = match service.policy_for_year(args.year).await {
        Ok(policy) => policy,
        Err(ServiceError::Declaration(DeclarationError::Configuration(
            ConfigurationError::NoPolicyForYear(_),
        ))) => TaxPolicy::default_for_2025(),
        Err(ServiceError::Declaration(DeclarationError::Validation(e))) => {
            warn!(
                year = args.year,
                error = %e,
                "stored policy is invalid; starting from the built-in default"
            );
            TaxPolicy::default_for_2025()
        }
        Err(e) => return Err(e.into()),
    };
    policy.tax_year = args.year;

    if let Some(value) = args.exemption {
        policy.exemption_amount = value;
    }
    if let Some(value) = args.forfeiture_threshold {
        policy.exemption_forfeiture_threshold = value;
    }
    if let Some(value) = args.declaration_limit {
        policy.declaration_limit = value;
    }
    if let Some(value) = args.lump_sum_rate {
        policy.lump_sum_rate = value;
    }
    if let Some(value) = args.withholding_rate {
        policy.withholding_rate = value;
    }
    if let Some(path) = args.brackets {
        policy.brackets = read_brackets(&path)?;
    }

    policy.validate()?;
    Ok(policy)
}

fn read_brackets(path: &Path) -> Result<BracketTable> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read brackets: {}", path.display()))?;
    BracketTable::from_json(&text)
        .with_context(|| format!("Invalid bracket table in {}", path.display()))
}

async fn transaction_filter(
    repo: &dyn TaxRepository,
    args: FilterArgs,
) -> Result<TransactionFilter> {
    let taxpayer_id = match args.taxpayer {
        Some(key) => Some(resolve_taxpayer(repo, &key).await?.id),
        None => None,
    };

    Ok(TransactionFilter {
        year: args.year,
        month: args.month,
        taxpayer_id,
        transaction_type: args.transaction_type,
        source_ids: args.source_ids,
        is_taxable: args.taxable,
    })
}

async fn transactions<W: Write>(
    cmd: TransactionCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    match cmd {
        TransactionCommand::Add(args) => add_transaction(args, repo, out).await?,
        TransactionCommand::Show { id } => {
            let transaction = fetch_transaction(repo, id).await?;
            output::write_transaction(out, &transaction)?;
        }
        TransactionCommand::Update(args) => update_transaction(args, repo, out).await?,
        TransactionCommand::Delete { id } => {
            match repo.delete_transaction(id).await {
                Ok(()) => {}
                Err(RepositoryError::NotFound) => bail!("Transaction #{} not found", id),
                Err(e) => return Err(e.into()),
            }
            info!(id, "transaction deleted");
            writeln!(out, "Deleted transaction #{}.", id)?;
        }
        TransactionCommand::Years => {
            let years = repo.list_transaction_years().await?;
            if years.is_empty() {
                writeln!(out, "No transactions.")?;
            }
            for year in years {
                writeln!(out, "{}", year)?;
            }
        }
        TransactionCommand::List(args) => {
            let filter = transaction_filter(repo, args).await?;
            let transactions = repo.list_transactions(&filter).await?;
            output::write_transactions(out, &transactions)?;
        }
        TransactionCommand::Summary(args) => {
            let filter = transaction_filter(repo, args).await?;
            let summary = DeclarationService::new(repo)
                .transaction_summary(&filter)
                .await?;
            output::write_summary(out, &summary)?;
        }
        TransactionCommand::Export {
            filter,
            output: destination,
        } => {
            let filter = transaction_filter(repo, filter).await?;
            let transactions = repo.list_transactions(&filter).await?;

            match destination {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("Failed to create: {}", path.display()))?;
                    let rows = TransactionExporter::write(file, &transactions)?;
                    writeln!(out, "Exported {} transaction(s) to {}", rows, path.display())?;
                }
                None => {
                    TransactionExporter::write(&mut *out, &transactions)?;
                }
            }
        }
        TransactionCommand::Import { taxpayer, file } => {
            let taxpayer = resolve_taxpayer(repo, &taxpayer).await?;
            let reader = File::open(&file)
                .with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = TransactionLoader::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;

            let summary = TransactionLoader::load(repo, taxpayer.id, &records)
                .await
                .context("Failed to load transactions")?;
            writeln!(
                out,
                "Imported {} transaction(s) for {} ({} skipped).",
                summary.inserted, taxpayer.full_name, summary.skipped
            )?;
        }
    }
    Ok(())
}

async fn add_transaction<W: Write>(
    args: AddTransactionArgs,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    check_amount(args.amount)?;
    let taxpayer = resolve_taxpayer(repo, &args.taxpayer).await?;
    let source_id = match &args.source {
        Some(key) => Some(
            resolve_source(repo, taxpayer.id, args.transaction_type, key)
                .await?
                .id,
        ),
        None => None,
    };
    let method = resolve_payment_method(repo, &args.payment_method).await?;
    if let Some(id) = args.document {
        ensure_document(repo, id).await?;
    }

    let mut new = NewTransaction::on_date(
        taxpayer.id,
        args.date,
        args.transaction_type,
        source_id,
        method.id,
        args.amount,
    );
    new.is_taxable = args.taxable;
    new.description = args.description.and_then(text_update);
    new.tax_item_code = args.tax_item_code.and_then(text_update);
    new.document_id = args.document;

    let transaction = repo
        .create_transaction(new)
        .await
        .context("Failed to add transaction")?;
    info!(
        id = transaction.id,
        taxpayer_id = transaction.taxpayer_id,
        "transaction recorded"
    );
    writeln!(
        out,
        "Added {} transaction #{} of {} on {}.",
        transaction.transaction_type.as_str(),
        transaction.id,
        output::money(transaction.amount),
        transaction.transaction_date
    )?;
    Ok(())
}

async fn update_transaction<W: Write>(
    args: UpdateTransactionArgs,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    let mut transaction = fetch_transaction(repo, args.id).await?;

    if let Some(date) = args.date {
        transaction.transaction_date = date;
        transaction.year = date.year();
        transaction.month = Some(date.month());
        transaction.day = Some(date.day());
    }
    if args.no_source {
        transaction.source_id = None;
    } else if let Some(key) = &args.source {
        let source = resolve_source(
            repo,
            transaction.taxpayer_id,
            transaction.transaction_type,
            key,
        )
        .await?;
        transaction.source_id = Some(source.id);
    }
    if let Some(key) = &args.payment_method {
        transaction.payment_method_id = resolve_payment_method(repo, key).await?.id;
    }
    if let Some(amount) = args.amount {
        check_amount(amount)?;
        transaction.amount = amount;
    }
    if let Some(taxable) = args.taxable {
        transaction.is_taxable = taxable;
    }
    if let Some(description) = args.description {
        transaction.description = text_update(description);
    }
    if let Some(code) = args.tax_item_code {
        transaction.tax_item_code = text_update(code);
    }
    if args.no_document {
        transaction.document_id = None;
    } else if let Some(id) = args.document {
        ensure_document(repo, id).await?;
        transaction.document_id = Some(id);
    }

    repo.update_transaction(&transaction)
        .await
        .with_context(|| format!("Failed to update transaction #{}", transaction.id))?;
    info!(id = transaction.id, "transaction updated");

    let updated = fetch_transaction(repo, transaction.id).await?;
    output::write_transaction(out, &updated)?;
    Ok(())
}

async fn documents<W: Write>(
    cmd: DocumentCommand,
    repo: &dyn TaxRepository,
    docs_root: &Path,
    out: &mut W,
) -> Result<()> {
    match cmd {
        DocumentCommand::List => {
            let documents = repo.list_documents().await?;
            output::write_documents(out, &documents, docs_root)?;
        }
        DocumentCommand::Add(args) => add_document(args, repo, docs_root, out).await?,
    }
    Ok(())
}

async fn add_document<W: Write>(
    args: AddDocumentArgs,
    repo: &dyn TaxRepository,
    docs_root: &Path,
    out: &mut W,
) -> Result<()> {
    let display_name = args.name.trim();
    if display_name.is_empty() {
        bail!("Document name must not be empty");
    }
    if args.path.is_absolute() {
        bail!(
            "Document path {} must be relative to the documents root",
            args.path.display()
        );
    }
    let relative_path = args
        .path
        .to_str()
        .with_context(|| format!("Document path {} is not valid UTF-8", args.path.display()))?;

    let document = repo
        .create_document(NewDocument {
            doc_ref: args.doc_ref.and_then(text_update),
            display_name: display_name.to_string(),
            relative_path: relative_path.to_string(),
            gdrive_id: args.gdrive_id.and_then(text_update),
        })
        .await
        .context("Failed to add document")?;

    let local_path = document.full_local_path(docs_root);
    if !local_path.exists() {
        warn!(path = %local_path.display(), "no file at the document path yet");
    }
    info!(id = document.id, "document registered");
    writeln!(
        out,
        "Added document #{} {} at {}",
        document.id,
        document.display_name,
        local_path.display()
    )?;
    Ok(())
}

async fn declarations<W: Write>(
    cmd: DeclarationCommand,
    repo: &dyn TaxRepository,
    out: &mut W,
) -> Result<()> {
    match cmd {
        DeclarationCommand::List { taxpayer, year } => {
            let taxpayer = resolve_taxpayer(repo, &taxpayer).await?;
            let declarations = DeclarationService::new(repo)
                .list_declarations(taxpayer.id, year)
                .await?;
            output::write_declarations(out, &declarations)?;
        }
    }
    Ok(())
}
