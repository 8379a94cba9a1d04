//! # REST API Interface Layer
//!
//! HTTP endpoints for the medicine tracker. This layer handles:
//! - JSON and multipart request decoding into explicit request structs
//! - Mapping between wire DTOs and domain commands
//! - Translating domain errors into status codes and JSON error bodies
//!
//! No business rules live here; every handler delegates to the
//! `MedicineService`.

pub mod error;
pub mod extract;
pub mod mappers;
pub mod medicine_apis;
pub mod prescription_apis;

use axum::Router;

use crate::AppState;

/// All JSON/binary API routes
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(medicine_apis::router())
        .merge(prescription_apis::router())
}
