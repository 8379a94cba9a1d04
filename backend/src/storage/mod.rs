//! # Storage Module
//!
//! Persistence for the medicine tracker.
//!
//! - **connection**: SQLite pool ownership and idempotent schema setup
//! - **repositories**: CRUD statements for the `medicines` table
//! - **file_store**: prescription images kept in a local directory
//!
//! The domain layer talks to the database through the [`MedicineStorage`]
//! trait so services can be exercised against failing or fake storage.

pub mod connection;
pub mod file_store;
pub mod repositories;
pub mod traits;

pub use connection::DbConnection;
pub use file_store::{FileStore, FileStoreError};
pub use repositories::MedicineRepository;
pub use traits::MedicineStorage;

/// Errors raised by the database layer
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Medicine not found: {0}")]
    NotFound(i64),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt medicine row {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}
