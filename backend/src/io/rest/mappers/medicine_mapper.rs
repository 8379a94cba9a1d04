use crate::domain::commands::{CreateMedicineCommand, MedicineListQuery, UpdateMedicineCommand};
use crate::domain::models::medicine::Medicine as DomainMedicine;
use shared::{
    CreateMedicineRequest, Medicine as SharedMedicine, MedicineListQuery as SharedListQuery,
    MedicineListResponse, UpdateMedicineRequest,
};

/// Mapper between shared medicine DTOs and domain types
pub struct MedicineMapper;

impl MedicineMapper {
    pub fn to_dto(domain: DomainMedicine) -> SharedMedicine {
        SharedMedicine {
            id: domain.id,
            name: domain.name,
            medicine_type: domain.medicine_type,
            dosage: domain.dosage,
            time_of_day: domain.time_of_day,
            notes: domain.notes,
            active: domain.active,
            prescription_path: domain.prescription_path,
            created_at: domain.created_at.to_rfc3339(),
            updated_at: domain.updated_at.to_rfc3339(),
        }
    }

    pub fn to_list_response(medicines: Vec<DomainMedicine>) -> MedicineListResponse {
        MedicineListResponse {
            medicines: medicines.into_iter().map(Self::to_dto).collect(),
        }
    }

    pub fn to_create_command(request: CreateMedicineRequest) -> CreateMedicineCommand {
        CreateMedicineCommand {
            name: request.name,
            medicine_type: request.medicine_type,
            dosage: request.dosage,
            time_of_day: request.time_of_day,
            notes: request.notes,
            active: request.active,
            prescription_path: request.prescription_path,
        }
    }

    pub fn to_update_command(request: UpdateMedicineRequest) -> UpdateMedicineCommand {
        UpdateMedicineCommand {
            name: request.name,
            medicine_type: request.medicine_type,
            dosage: request.dosage,
            time_of_day: request.time_of_day,
            notes: request.notes,
            active: request.active,
            prescription_path: request.prescription_path,
            remove_prescription: request.remove_prescription,
        }
    }

    pub fn to_list_query(query: SharedListQuery) -> MedicineListQuery {
        MedicineListQuery {
            time_of_day: query.time_of_day,
        }
    }

    /// URL a stored prescription is served from
    pub fn prescription_url(path: &str) -> String {
        format!("/prescriptions/{path}")
    }
}
