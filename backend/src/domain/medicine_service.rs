use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::commands::{
    CreateMedicineCommand, MedicineListQuery, PrescriptionUpload, UpdateMedicineCommand,
};
use crate::domain::error::MedicineError;
use crate::domain::models::medicine::{
    canonical_times, Medicine, MedicinePatch, MedicineValidationError, NewMedicineRecord,
    MAX_DOSAGE_LEN, MAX_NAME_LEN, MAX_NOTES_LEN,
};
use crate::storage::{FileStore, FileStoreError, MedicineStorage};
use shared::TimeOfDay;

/// Service for managing medicines and their prescription images
#[derive(Clone)]
pub struct MedicineService {
    storage: Arc<dyn MedicineStorage>,
    files: FileStore,
}

impl MedicineService {
    pub fn new(storage: Arc<dyn MedicineStorage>, files: FileStore) -> Self {
        Self { storage, files }
    }

    /// Create a medicine, optionally storing an uploaded prescription first
    pub async fn add_medicine(
        &self,
        command: CreateMedicineCommand,
        upload: Option<PrescriptionUpload>,
    ) -> Result<Medicine, MedicineError> {
        info!("Adding medicine: name={}, upload={:?}", command.name, upload);

        let name = validate_name(&command.name)?;
        let dosage = validate_dosage(&command.dosage)?;
        let time_of_day = validate_times(&command.time_of_day)?;
        let notes = normalize_notes(command.notes.as_deref())?;

        if upload.is_some() && command.prescription_path.is_some() {
            return Err(MedicineValidationError::ConflictingPrescriptionChange.into());
        }
        if let Some(path) = &command.prescription_path {
            self.ensure_prescription_exists(path).await?;
        }

        let saved = self.save_upload(upload).await?;

        let record = NewMedicineRecord {
            name,
            medicine_type: command.medicine_type,
            dosage,
            time_of_day,
            notes,
            active: command.active.unwrap_or(true),
            prescription_path: saved.clone().or(command.prescription_path),
            created_at: Utc::now(),
        };

        let id = match self.storage.create(&record).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to store medicine '{}': {}", record.name, e);
                self.discard_upload(saved).await;
                return Err(e.into());
            }
        };

        info!("Added medicine: {} with ID: {}", record.name, id);

        Ok(Medicine {
            id,
            name: record.name,
            medicine_type: record.medicine_type,
            dosage: record.dosage,
            time_of_day: record.time_of_day,
            notes: record.notes,
            active: record.active,
            prescription_path: record.prescription_path,
            created_at: record.created_at,
            updated_at: record.created_at,
        })
    }

    /// Apply a partial update.
    ///
    /// A replacement image is saved before the record is touched, and the
    /// previous image is deleted only once the update has succeeded, so a
    /// failed update never loses the old prescription.
    pub async fn edit_medicine(
        &self,
        id: i64,
        command: UpdateMedicineCommand,
        upload: Option<PrescriptionUpload>,
    ) -> Result<Medicine, MedicineError> {
        info!("Editing medicine {}: {:?}, upload={:?}", id, command, upload);

        let existing = self.storage.get(id).await?;

        let mut patch = MedicinePatch {
            name: command.name.as_deref().map(validate_name).transpose()?,
            medicine_type: command.medicine_type,
            dosage: command.dosage.as_deref().map(validate_dosage).transpose()?,
            time_of_day: command.time_of_day.as_deref().map(validate_times).transpose()?,
            notes: command.notes.as_deref().map(|notes| normalize_notes(Some(notes))).transpose()?,
            active: command.active,
            prescription_path: None,
        };

        let prescription_changes = [
            upload.is_some(),
            command.prescription_path.is_some(),
            command.remove_prescription,
        ];
        if prescription_changes.iter().filter(|changed| **changed).count() > 1 {
            return Err(MedicineValidationError::ConflictingPrescriptionChange.into());
        }

        if let Some(path) = command.prescription_path {
            if existing.prescription_path.as_deref() != Some(path.as_str()) {
                self.ensure_prescription_exists(&path).await?;
            }
            patch.prescription_path = Some(Some(path));
        }
        if command.remove_prescription {
            patch.prescription_path = Some(None);
        }

        if patch.is_empty() && upload.is_none() {
            return Err(MedicineValidationError::EmptyUpdate.into());
        }

        let saved = self.save_upload(upload).await?;
        if let Some(stored) = &saved {
            patch.prescription_path = Some(Some(stored.clone()));
        }

        if let Err(e) = self.storage.update(id, &patch, Utc::now()).await {
            error!("Failed to update medicine {}: {}", id, e);
            self.discard_upload(saved).await;
            return Err(e.into());
        }

        if let (Some(old), Some(new)) = (&existing.prescription_path, &patch.prescription_path) {
            if new.as_ref() != Some(old) {
                self.release_prescription(old).await;
            }
        }

        let updated = self.storage.get(id).await?;
        info!("Updated medicine: {} with ID: {}", updated.name, updated.id);
        Ok(updated)
    }

    /// Replace (or set) the prescription image of a medicine
    pub async fn attach_prescription(&self, id: i64, upload: PrescriptionUpload) -> Result<Medicine, MedicineError> {
        self.edit_medicine(id, UpdateMedicineCommand::default(), Some(upload)).await
    }

    /// Delete a medicine and its prescription image
    pub async fn remove_medicine(&self, id: i64) -> Result<(), MedicineError> {
        info!("Removing medicine: {}", id);

        let existing = self.storage.get(id).await.map_err(|e| {
            warn!("Cannot remove medicine {}: {}", id, e);
            e
        })?;

        self.storage.delete(id).await?;

        if let Some(path) = &existing.prescription_path {
            self.release_prescription(path).await;
        }

        info!("Removed medicine: {} with ID: {}", existing.name, id);
        Ok(())
    }

    pub async fn get_medicine(&self, id: i64) -> Result<Medicine, MedicineError> {
        info!("Getting medicine: {}", id);
        Ok(self.storage.get(id).await?)
    }

    /// Medicines ordered by earliest time of day, then name
    pub async fn list_medicines(&self, query: MedicineListQuery) -> Result<Vec<Medicine>, MedicineError> {
        info!("Listing medicines: {:?}", query);

        let mut medicines = self.storage.list(query.time_of_day).await?;
        sort_for_display(&mut medicines);

        info!("Found {} medicines", medicines.len());
        Ok(medicines)
    }

    /// Stored image bytes with their MIME type
    pub async fn read_prescription(&self, path: &str) -> Result<(Vec<u8>, &'static str), MedicineError> {
        let bytes = self.files.read(path).await?;
        Ok((bytes, FileStore::content_type(path)))
    }

    async fn ensure_prescription_exists(&self, path: &str) -> Result<(), MedicineError> {
        match self.files.exists(path).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(FileStoreError::InvalidPath(_)) => {
                Err(MedicineValidationError::UnknownPrescription(path.to_string()).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save_upload(&self, upload: Option<PrescriptionUpload>) -> Result<Option<String>, MedicineError> {
        match upload {
            Some(upload) => Ok(Some(self.files.save(&upload.bytes, &upload.file_name).await?)),
            None => Ok(None),
        }
    }

    /// Remove an image that was saved for a write that then failed
    async fn discard_upload(&self, saved: Option<String>) {
        if let Some(stored) = saved {
            if let Err(e) = self.files.delete(&stored).await {
                error!("Failed to remove prescription {} after failed write: {}", stored, e);
            }
        }
    }

    /// Delete an image once no medicine links it any more.
    /// The owning write has already succeeded, so failures are logged only.
    async fn release_prescription(&self, path: &str) {
        match self.storage.count_prescription_references(path).await {
            Ok(0) => {
                if let Err(e) = self.files.delete(path).await {
                    error!("Failed to delete orphaned prescription {}: {}", path, e);
                }
            }
            Ok(count) => info!("Keeping prescription {} still linked by {} medicines", path, count),
            Err(e) => error!("Failed to check references to prescription {}: {}", path, e),
        }
    }
}

/// Sort by earliest time of day, then case-insensitive name, then id
pub fn sort_for_display(medicines: &mut [Medicine]) {
    medicines.sort_by(|a, b| {
        a.first_time_of_day()
            .cmp(&b.first_time_of_day())
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
            .then(a.id.cmp(&b.id))
    });
}

fn validate_name(name: &str) -> Result<String, MedicineValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(MedicineValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(MedicineValidationError::NameTooLong);
    }
    Ok(name.to_string())
}

fn validate_dosage(dosage: &str) -> Result<String, MedicineValidationError> {
    let dosage = dosage.trim();
    if dosage.is_empty() {
        return Err(MedicineValidationError::EmptyDosage);
    }
    if dosage.chars().count() > MAX_DOSAGE_LEN {
        return Err(MedicineValidationError::DosageTooLong);
    }
    Ok(dosage.to_string())
}

fn validate_times(times: &[TimeOfDay]) -> Result<Vec<TimeOfDay>, MedicineValidationError> {
    if times.is_empty() {
        return Err(MedicineValidationError::NoTimeOfDay);
    }
    Ok(canonical_times(times))
}

/// Trimmed notes; blank notes become `None`
fn normalize_notes(notes: Option<&str>) -> Result<Option<String>, MedicineValidationError> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(notes) if notes.chars().count() > MAX_NOTES_LEN => Err(MedicineValidationError::NotesTooLong),
        Some(notes) => Ok(Some(notes.to_string())),
    }
}
