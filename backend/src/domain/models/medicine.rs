//! Domain model for a tracked medicine.
use chrono::{DateTime, Utc};
use shared::{MedicineType, TimeOfDay};

#[derive(Debug, Clone, PartialEq)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    pub medicine_type: MedicineType,
    pub dosage: String,
    /// Sorted, no duplicates, never empty
    pub time_of_day: Vec<TimeOfDay>,
    pub notes: Option<String>,
    pub active: bool,
    pub prescription_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Medicine {
    /// Earliest scheduled time, used as the primary list ordering key
    pub fn first_time_of_day(&self) -> Option<TimeOfDay> {
        self.time_of_day.iter().min().copied()
    }

    pub fn is_taken_at(&self, time: TimeOfDay) -> bool {
        self.time_of_day.contains(&time)
    }
}

/// A validated medicine that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedicineRecord {
    pub name: String,
    pub medicine_type: MedicineType,
    pub dosage: String,
    pub time_of_day: Vec<TimeOfDay>,
    pub notes: Option<String>,
    pub active: bool,
    pub prescription_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated partial update. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedicinePatch {
    pub name: Option<String>,
    pub medicine_type: Option<MedicineType>,
    pub dosage: Option<String>,
    pub time_of_day: Option<Vec<TimeOfDay>>,
    /// `Some(None)` clears the notes
    pub notes: Option<Option<String>>,
    pub active: Option<bool>,
    /// `Some(None)` unlinks the prescription
    pub prescription_path: Option<Option<String>>,
}

impl MedicinePatch {
    pub fn is_empty(&self) -> bool {
        *self == MedicinePatch::default()
    }
}

/// Normalize a set of times: sorted by time of day, duplicates removed
pub fn canonical_times(times: &[TimeOfDay]) -> Vec<TimeOfDay> {
    let mut times = times.to_vec();
    times.sort();
    times.dedup();
    times
}

/// Column encoding for a set of times, e.g. "morning,evening"
pub fn encode_times(times: &[TimeOfDay]) -> String {
    canonical_times(times)
        .iter()
        .map(TimeOfDay::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

pub fn decode_times(raw: &str) -> Result<Vec<TimeOfDay>, shared::ParseEnumError> {
    let times = raw
        .split(',')
        .filter(|part| !part.trim().is_empty())
        .map(str::parse)
        .collect::<Result<Vec<TimeOfDay>, _>>()?;
    Ok(canonical_times(&times))
}

#[derive(Debug, thiserror::Error)]
pub enum MedicineValidationError {
    #[error("Medicine name cannot be empty")]
    EmptyName,
    #[error("Medicine name cannot exceed 100 characters")]
    NameTooLong,
    #[error("Dosage cannot be empty")]
    EmptyDosage,
    #[error("Dosage cannot exceed 50 characters")]
    DosageTooLong,
    #[error("At least one time of day is required")]
    NoTimeOfDay,
    #[error("Notes cannot exceed 500 characters")]
    NotesTooLong,
    #[error("Prescription '{0}' does not exist")]
    UnknownPrescription(String),
    #[error("Cannot both upload and remove a prescription")]
    ConflictingPrescriptionChange,
    #[error("No fields to update")]
    EmptyUpdate,
}

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DOSAGE_LEN: usize = 50;
pub const MAX_NOTES_LEN: usize = 500;
