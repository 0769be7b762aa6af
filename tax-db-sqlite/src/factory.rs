use std::path::PathBuf;

use async_trait::async_trait;
use tax_core::db::{DbConfig, RepositoryFactory};
use tax_core::{RepositoryError, TaxRepository};
use tracing::info;

use crate::repository::SqliteRepository;

/// Overrides where [`seeds_dir`] looks for seed SQL.
pub const SEEDS_DIR_ENV: &str = "MTAX_SEEDS_DIR";

/// Resolve the seeds directory at runtime so it works both from the build
/// tree and from an installed binary.
///
/// Resolution order:
/// 1. **`MTAX_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if it exists in the current working directory.
/// 3. **`$CARGO_MANIFEST_DIR/seeds`** of this crate.
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(SEEDS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// [`RepositoryFactory`] for SQLite.
///
/// ```rust,no_run
/// use tax_core::db::RepositoryRegistry;
/// use tax_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Opens `config.connection_string` (a file path, a `sqlite:` URL or
    /// `:memory:`), migrates it and applies the seed files. Seeds only insert
    /// missing rows, so reopening an existing store leaves edits intact.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn TaxRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{:#}", e)))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{:#}", e)))?;

        let seeds = seeds_dir();
        repo.run_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{:#}", e)))?;

        info!(
            database = %config.connection_string,
            seeds = %seeds.display(),
            "sqlite store ready"
        );
        Ok(Box::new(repo))
    }
}
