//! # Storage Traits
//!
//! Abstraction over the medicine table so the domain layer does not depend
//! on SQLite directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::TimeOfDay;

use super::StorageError;
use crate::domain::models::medicine::{Medicine, MedicinePatch, NewMedicineRecord};

#[async_trait]
pub trait MedicineStorage: Send + Sync {
    /// Insert a new medicine and return its generated id
    async fn create(&self, record: &NewMedicineRecord) -> Result<i64, StorageError>;

    /// Apply a partial update. Fails with `NotFound` if the id is absent.
    async fn update(&self, id: i64, patch: &MedicinePatch, updated_at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Delete a medicine. Fails with `NotFound` if the id is absent.
    async fn delete(&self, id: i64) -> Result<(), StorageError>;

    /// All medicines, optionally only those taken at the given time, in id order
    async fn list(&self, time_of_day: Option<TimeOfDay>) -> Result<Vec<Medicine>, StorageError>;

    async fn get(&self, id: i64) -> Result<Medicine, StorageError>;

    /// Number of medicines linking the given prescription image
    async fn count_prescription_references(&self, path: &str) -> Result<i64, StorageError>;
}
