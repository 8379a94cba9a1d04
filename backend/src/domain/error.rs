use crate::domain::models::medicine::MedicineValidationError;
use crate::storage::{FileStoreError, StorageError};

/// Errors surfaced by the medicine service
#[derive(Debug, thiserror::Error)]
pub enum MedicineError {
    #[error("{0}")]
    Validation(String),

    #[error("Medicine not found: {0}")]
    NotFound(i64),

    #[error("{0}")]
    UnsupportedType(String),

    /// Request body over the configured upload limit
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Prescription not found: {0}")]
    PrescriptionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[source] StorageError),

    #[error("File store error: {0}")]
    Io(#[source] std::io::Error),
}

impl From<StorageError> for MedicineError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::NotFound(id) => MedicineError::NotFound(id),
            StorageError::MissingField(_) => MedicineError::Validation(error.to_string()),
            other => MedicineError::Storage(other),
        }
    }
}

impl From<FileStoreError> for MedicineError {
    fn from(error: FileStoreError) -> Self {
        match error {
            FileStoreError::UnsupportedType(_) => MedicineError::UnsupportedType(error.to_string()),
            FileStoreError::TooLarge { .. } | FileStoreError::Empty => MedicineError::Validation(error.to_string()),
            FileStoreError::InvalidPath(path) | FileStoreError::NotFound(path) => {
                MedicineError::PrescriptionNotFound(path)
            }
            FileStoreError::Io(e) => MedicineError::Io(e),
        }
    }
}

impl From<MedicineValidationError> for MedicineError {
    fn from(error: MedicineValidationError) -> Self {
        MedicineError::Validation(error.to_string())
    }
}
