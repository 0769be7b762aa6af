//! Household income-tax declaration engine.
//!
//! [`calculations`] holds the pure pipeline that turns income, expenses and
//! special deductions into an itemized [`DeclarationResult`]. [`db`] defines
//! the storage seam and [`service`] connects the two.

pub mod calculations;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use db::repository::{RepositoryError, TaxRepository};
pub use error::{ConfigurationError, DeclarationError, ValidationError};
pub use models::*;
pub use service::{DeclarationService, ServiceError};
