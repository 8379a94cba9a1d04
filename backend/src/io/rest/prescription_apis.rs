//! # REST API for Prescription Images

use axum::{
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::info;

use crate::domain::MedicineError;
use crate::io::rest::extract::ApiPath;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/prescriptions/:path", get(get_prescription))
}

/// Serve a stored prescription image
pub async fn get_prescription(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
) -> Result<impl IntoResponse, MedicineError> {
    info!("GET /prescriptions/{}", path);

    let (bytes, content_type) = state.medicine_service.read_prescription(&path).await?;
    Ok((
        [(CONTENT_TYPE, content_type), (CACHE_CONTROL, "private, max-age=3600")],
        bytes,
    ))
}
