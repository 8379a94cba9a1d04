//! Translation of domain errors into HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use shared::ErrorResponse;
use tracing::{error, warn};

use crate::domain::MedicineError;

impl MedicineError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            MedicineError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            MedicineError::UnsupportedType(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_TYPE"),
            MedicineError::PayloadTooLarge(_) => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            MedicineError::NotFound(_) | MedicineError::PrescriptionNotFound(_) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            MedicineError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            MedicineError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for MedicineError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!("Request failed: {:?}", self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
