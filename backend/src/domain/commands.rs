//! Domain-level command and query types.
//! The REST layer maps the public DTOs from the `shared` crate onto these.

use shared::{MedicineType, TimeOfDay};

/// Input for creating a medicine
#[derive(Debug, Clone)]
pub struct CreateMedicineCommand {
    pub name: String,
    pub medicine_type: MedicineType,
    pub dosage: String,
    pub time_of_day: Vec<TimeOfDay>,
    pub notes: Option<String>,
    pub active: Option<bool>,
    /// Link an image that is already in the store
    pub prescription_path: Option<String>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateMedicineCommand {
    pub name: Option<String>,
    pub medicine_type: Option<MedicineType>,
    pub dosage: Option<String>,
    pub time_of_day: Option<Vec<TimeOfDay>>,
    /// An empty string clears the notes
    pub notes: Option<String>,
    pub active: Option<bool>,
    pub prescription_path: Option<String>,
    pub remove_prescription: bool,
}

/// An uploaded prescription image
#[derive(Clone)]
pub struct PrescriptionUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for PrescriptionUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrescriptionUpload")
            .field("file_name", &self.file_name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Query parameters for listing medicines
#[derive(Debug, Clone, Copy, Default)]
pub struct MedicineListQuery {
    pub time_of_day: Option<TimeOfDay>,
}
