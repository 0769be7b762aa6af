//! SQLite storage for the declaration assistant.
//!
//! [`SqliteRepository`] implements [`tax_core::TaxRepository`] over a `sqlx`
//! pool. The schema lives in `migrations/`; `seeds/` holds the payment
//! methods and the built-in 2025 policy. [`SqliteRepositoryFactory`] plugs the
//! backend into a [`tax_core::db::RepositoryRegistry`] under the name
//! `"sqlite"`.

mod columns;
mod factory;
mod repository;

pub use factory::{SEEDS_DIR_ENV, SqliteRepositoryFactory, seeds_dir};
pub use repository::SqliteRepository;
