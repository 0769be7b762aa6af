use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use tax_cli::app;
use tax_cli::cli::Cli;
use tax_cli::config::{MtaxConfig, Overrides};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so JSON and CSV output on stdout stays clean.
fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = MtaxConfig::load(cli.config.as_deref())?.resolve(Overrides {
        backend: cli.backend,
        connection_string: cli.db,
        log_level: cli.log_level,
        docs_root: cli.docs_root,
    });
    init_tracing(&config.log_level);
    debug!(
        backend = %config.db.backend,
        database = %config.db.connection_string,
        "configuration resolved"
    );

    let repo = app::open_repository(&config.db).await?;

    let mut out = io::stdout();
    app::run(cli.command, repo.as_ref(), &config.docs_root, &mut out).await?;
    out.flush()?;

    Ok(())
}
