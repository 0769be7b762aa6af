use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tax_core::{DEFAULT_POLICY_YEAR, ExpenseMethod, SpecialDeduction, TransactionType};

/// Household income-tax declaration assistant.
///
/// Records income and expense transactions per taxpayer and computes the
/// yearly declaration: gross income, exemption, deductible expense, capped
/// special deductions, progressive tax and the amount still due after
/// withholding.
#[derive(Debug, Parser)]
#[command(name = "mtax", version, about, long_about = None)]
pub struct Cli {
    /// Config file. Defaults to ./mtax.toml when present.
    #[arg(long, global = true, env = "MTAX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage backend.
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Database connection string: a file path (e.g. `mtax.db`) or `:memory:`.
    #[arg(long, global = true, env = "MTAX_DATABASE")]
    pub db: Option<String>,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Directory that document paths are relative to.
    #[arg(long, global = true, env = "MTAX_DOCS_ROOT")]
    pub docs_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the schema and load the seed data.
    Init,

    /// Manage taxpayers.
    #[command(subcommand)]
    Taxpayers(TaxpayerCommand),

    /// Manage income and expense sources.
    #[command(subcommand)]
    Sources(SourceCommand),

    /// Manage payment methods.
    #[command(subcommand)]
    PaymentMethods(PaymentMethodCommand),

    /// Compute the declaration for a taxpayer and year.
    Calculate(CalculateArgs),

    /// Show or change the tax policy of a year.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Record, edit, list, summarize, export or import transactions.
    #[command(subcommand)]
    Transactions(TransactionCommand),

    /// Supporting documents that transactions can point to.
    #[command(subcommand)]
    Documents(DocumentCommand),

    /// Saved declarations.
    #[command(subcommand)]
    Declarations(DeclarationCommand),
}

#[derive(Debug, Subcommand)]
pub enum TaxpayerCommand {
    List,
    Add {
        /// Full name, unique.
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SourceCommand {
    List {
        /// Only this taxpayer's sources (name or id).
        #[arg(long)]
        taxpayer: Option<String>,
    },
    Add(AddSourceArgs),
}

#[derive(Debug, Args)]
pub struct AddSourceArgs {
    /// Owner (name or id).
    #[arg(long)]
    pub taxpayer: String,

    #[arg(long)]
    pub name: String,

    /// `income` or `expense`.
    #[arg(long, value_parser = parse_transaction_type)]
    pub kind: TransactionType,

    /// Income on this source is reported net of withholding.
    #[arg(long, default_value_t = false)]
    pub net: bool,

    /// Expenses on this source are special deductions.
    #[arg(long, default_value_t = false)]
    pub special: bool,

    #[arg(long)]
    pub detail: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum PaymentMethodCommand {
    List,
    Add { name: String },
}

#[derive(Debug, Args)]
pub struct CalculateArgs {
    /// Taxpayer name or id.
    #[arg(long)]
    pub taxpayer: String,

    #[arg(long, default_value_t = DEFAULT_POLICY_YEAR)]
    pub year: i32,

    /// `lump_sum` or `actual`.
    #[arg(long, default_value = "actual")]
    pub method: ExpenseMethod,

    /// Special deduction as LABEL=AMOUNT. Repeatable; replaces the
    /// deductions derived from special-class expense sources.
    #[arg(long = "deduction", value_parser = parse_deduction)]
    pub deductions: Vec<SpecialDeduction>,

    /// Save the result as a declaration with this name.
    #[arg(long)]
    pub save: Option<String>,

    /// Save with status `submitted` instead of `draft`.
    #[arg(long, default_value_t = false, requires = "save")]
    pub submitted: bool,

    /// Print the full result as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Print the policy that applies to a year.
    Show {
        #[arg(long, default_value_t = DEFAULT_POLICY_YEAR)]
        year: i32,

        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Store a policy for a year. Omitted values are taken from the policy
    /// currently in effect for that year, or from the built-in default.
    Set(SetPolicyArgs),
    /// Years with a stored policy.
    Years,
}

#[derive(Debug, Args)]
pub struct SetPolicyArgs {
    #[arg(long)]
    pub year: i32,

    #[arg(long)]
    pub exemption: Option<Decimal>,

    /// Income above which the exemption is lost; 0 disables the rule.
    #[arg(long)]
    pub forfeiture_threshold: Option<Decimal>,

    #[arg(long)]
    pub declaration_limit: Option<Decimal>,

    #[arg(long)]
    pub lump_sum_rate: Option<Decimal>,

    #[arg(long)]
    pub withholding_rate: Option<Decimal>,

    /// JSON file with `[{"limit": 158000, "rate": 0.15}, ..., {"limit": null, "rate": 0.4}]`.
    #[arg(long)]
    pub brackets: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum TransactionCommand {
    /// Record a single transaction.
    Add(AddTransactionArgs),
    /// Print one transaction.
    Show { id: i64 },
    /// Change fields of a stored transaction.
    Update(UpdateTransactionArgs),
    Delete { id: i64 },
    /// Years with at least one transaction.
    Years,
    List(FilterArgs),
    /// Totals for the filtered transactions.
    Summary(FilterArgs),
    /// Write the filtered transactions as CSV.
    Export {
        #[command(flatten)]
        filter: FilterArgs,

        /// Output file; stdout when omitted.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Load transactions for a taxpayer from CSV.
    Import {
        #[arg(long)]
        taxpayer: String,

        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct AddTransactionArgs {
    /// Taxpayer name or id.
    #[arg(long)]
    pub taxpayer: String,

    /// YYYY-MM-DD.
    #[arg(long)]
    pub date: NaiveDate,

    /// `income` or `expense`.
    #[arg(long = "type", value_parser = parse_transaction_type)]
    pub transaction_type: TransactionType,

    /// Source name or id; must belong to the taxpayer and match the type.
    #[arg(long)]
    pub source: Option<String>,

    /// Payment method name or id.
    #[arg(long)]
    pub payment_method: String,

    #[arg(long)]
    pub amount: Decimal,

    #[arg(long, default_value_t = false)]
    pub taxable: bool,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub tax_item_code: Option<String>,

    /// Id of a stored document.
    #[arg(long)]
    pub document: Option<i64>,
}

/// Fields left out keep their stored value.
#[derive(Debug, Args)]
pub struct UpdateTransactionArgs {
    pub id: i64,

    #[arg(long)]
    pub date: Option<NaiveDate>,

    /// Source name or id.
    #[arg(long, conflicts_with = "no_source")]
    pub source: Option<String>,

    /// Detach the transaction from its source.
    #[arg(long, default_value_t = false)]
    pub no_source: bool,

    #[arg(long)]
    pub payment_method: Option<String>,

    #[arg(long)]
    pub amount: Option<Decimal>,

    #[arg(long)]
    pub taxable: Option<bool>,

    /// An empty value clears it.
    #[arg(long)]
    pub description: Option<String>,

    /// An empty value clears it.
    #[arg(long)]
    pub tax_item_code: Option<String>,

    #[arg(long, conflicts_with = "no_document")]
    pub document: Option<i64>,

    /// Detach the transaction from its document.
    #[arg(long, default_value_t = false)]
    pub no_document: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    #[arg(long)]
    pub year: Option<i32>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub month: Option<u32>,

    /// Taxpayer name or id.
    #[arg(long)]
    pub taxpayer: Option<String>,

    /// `income` or `expense`.
    #[arg(long = "type", value_parser = parse_transaction_type)]
    pub transaction_type: Option<TransactionType>,

    /// Source id; repeatable.
    #[arg(long = "source")]
    pub source_ids: Vec<i64>,

    #[arg(long)]
    pub taxable: Option<bool>,
}

#[derive(Debug, Subcommand)]
pub enum DocumentCommand {
    List,
    Add(AddDocumentArgs),
}

#[derive(Debug, Args)]
pub struct AddDocumentArgs {
    /// Name shown in listings.
    #[arg(long)]
    pub name: String,

    /// Location below the documents root.
    #[arg(long)]
    pub path: PathBuf,

    /// External reference such as an invoice number.
    #[arg(long = "ref")]
    pub doc_ref: Option<String>,

    #[arg(long)]
    pub gdrive_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum DeclarationCommand {
    List {
        #[arg(long)]
        taxpayer: String,

        #[arg(long, default_value_t = DEFAULT_POLICY_YEAR)]
        year: i32,
    },
}

pub fn parse_transaction_type(s: &str) -> Result<TransactionType, String> {
    TransactionType::parse(s).ok_or_else(|| format!("expected 'income' or 'expense', got '{}'", s))
}

/// Parses `LABEL=AMOUNT`. The label may itself contain `=`; the amount is
/// whatever follows the last one.
pub fn parse_deduction(s: &str) -> Result<SpecialDeduction, String> {
    let (label, amount) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected LABEL=AMOUNT, got '{}'", s))?;

    let label = label.trim();
    if label.is_empty() {
        return Err(format!("missing label in '{}'", s));
    }

    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|e| format!("invalid amount in '{}': {}", s, e))?;

    Ok(SpecialDeduction::new(label, amount))
}
