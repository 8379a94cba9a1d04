//! # REST API for Medicine Management
//!
//! Endpoints for listing, creating, retrieving, updating and deleting
//! medicines, plus attaching a prescription image to an existing medicine.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use shared::{CreateMedicineRequest, MedicineListQuery, PrescriptionUploadResponse, UpdateMedicineRequest};
use tracing::info;

use crate::domain::MedicineError;
use crate::io::rest::extract::{ApiPath, ApiQuery, MedicineForm, PrescriptionOnly, PRESCRIPTION_FIELD};
use crate::io::rest::mappers::medicine_mapper::MedicineMapper;
use crate::AppState;

/// Create the medicine API router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/medicines", get(list_medicines).post(create_medicine))
        .route(
            "/medicines/:id",
            get(get_medicine)
                .put(update_medicine)
                .patch(update_medicine)
                .delete(delete_medicine),
        )
        .route("/medicines/:id/prescription", post(upload_prescription))
}

/// List medicines, optionally only those taken at one time of day
pub async fn list_medicines(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<MedicineListQuery>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("GET /medicines - query: {:?}", query);

    let medicines = state
        .medicine_service
        .list_medicines(MedicineMapper::to_list_query(query))
        .await?;

    Ok(Json(MedicineMapper::to_list_response(medicines)))
}

/// Create a medicine from JSON or a multipart form with an optional image
pub async fn create_medicine(
    State(state): State<AppState>,
    form: MedicineForm<CreateMedicineRequest>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("POST /medicines - request: {:?}", form);

    let medicine = state
        .medicine_service
        .add_medicine(MedicineMapper::to_create_command(form.body), form.upload)
        .await?;

    Ok((StatusCode::CREATED, Json(MedicineMapper::to_dto(medicine))))
}

/// Get a medicine by ID
pub async fn get_medicine(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("GET /medicines/{}", id);

    let medicine = state.medicine_service.get_medicine(id).await?;
    Ok(Json(MedicineMapper::to_dto(medicine)))
}

/// Partially update a medicine (PUT and PATCH behave the same)
pub async fn update_medicine(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    form: MedicineForm<UpdateMedicineRequest>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("PUT /medicines/{} - request: {:?}", id, form);

    let medicine = state
        .medicine_service
        .edit_medicine(id, MedicineMapper::to_update_command(form.body), form.upload)
        .await?;

    Ok(Json(MedicineMapper::to_dto(medicine)))
}

/// Delete a medicine and its prescription image
pub async fn delete_medicine(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("DELETE /medicines/{}", id);

    state.medicine_service.remove_medicine(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach or replace the prescription image of a medicine
pub async fn upload_prescription(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    form: MedicineForm<PrescriptionOnly>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("POST /medicines/{}/prescription - upload: {:?}", id, form.upload);

    let upload = form.upload.ok_or_else(|| {
        MedicineError::Validation(format!("Missing '{PRESCRIPTION_FIELD}' image"))
    })?;

    let medicine = state.medicine_service.attach_prescription(id, upload).await?;
    let url = medicine
        .prescription_path
        .as_deref()
        .map(MedicineMapper::prescription_url)
        .unwrap_or_default();

    Ok(Json(PrescriptionUploadResponse {
        medicine: MedicineMapper::to_dto(medicine),
        url,
    }))
}
