use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tax_core::TaxRepository;
use tax_data::TransactionLoader;
use tax_db_sqlite::SqliteRepository;
use tracing_subscriber::EnvFilter;

/// Load household transactions from a CSV file into the database.
///
/// The CSV file should have the following columns:
/// - date: `YYYY-MM-DD`
/// - type: `income` or `expense`
/// - source: name of one of the taxpayer's sources (may be empty)
/// - payment_method: name of a stored payment method
/// - amount: non-negative amount
/// - taxable, description, tax_item_code: optional
#[derive(Parser, Debug)]
#[command(name = "tax-data-loader")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the CSV file containing transactions
    #[arg(short, long)]
    file: PathBuf,

    /// Full name of the taxpayer the transactions belong to
    #[arg(short, long)]
    taxpayer: String,

    /// SQLite database path or URL; created if missing
    #[arg(short, long, default_value = "mtax.db", env = "MTAX_DATABASE")]
    database: String,

    /// Run database migrations before loading data
    #[arg(short, long, default_value_t = false)]
    migrate: bool,

    /// Run seed files from the specified directory after migrations
    #[arg(short, long)]
    seeds: Option<PathBuf>,

    /// Parse and resolve the file without writing anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .without_time()
        .init();

    let args = Args::parse();

    let repo = SqliteRepository::new(&args.database)
        .await
        .with_context(|| format!("Failed to connect to database: {}", args.database))?;

    if args.migrate {
        println!("Running migrations...");
        repo.run_migrations()
            .await
            .context("Failed to run migrations")?;
        println!("Migrations complete.");
    }

    if let Some(seeds_dir) = &args.seeds {
        println!("Running seeds from: {}", seeds_dir.display());
        repo.run_seeds(seeds_dir)
            .await
            .with_context(|| format!("Failed to run seeds from: {}", seeds_dir.display()))?;
        println!("Seeds complete.");
    }

    let taxpayers = repo
        .list_taxpayers()
        .await
        .context("Failed to list taxpayers")?;
    let Some(taxpayer) = taxpayers
        .iter()
        .find(|t| t.full_name.eq_ignore_ascii_case(&args.taxpayer))
    else {
        bail!("Taxpayer '{}' not found in database", args.taxpayer);
    };

    println!("Loading transactions from: {}", args.file.display());

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open: {}", args.file.display()))?;

    let records = TransactionLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", args.file.display()))?;

    println!("Parsed {} records from CSV", records.len());

    if args.dry_run {
        println!("Dry run: nothing written.");
        return Ok(());
    }

    let summary = TransactionLoader::load(&repo, taxpayer.id, &records)
        .await
        .context("Failed to load transactions into database")?;

    println!(
        "Loaded {} transactions for {} ({} skipped).",
        summary.inserted, taxpayer.full_name, summary.skipped
    );

    Ok(())
}
