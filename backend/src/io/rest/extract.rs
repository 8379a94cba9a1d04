//! # Medicine Form Extractor
//!
//! Medicine writes arrive either as JSON (API clients) or as
//! `multipart/form-data` (the HTML forms, which may carry a prescription
//! image). [`MedicineForm`] accepts both and produces the same explicit
//! request struct, rejecting unknown or repeated fields at the boundary.
//!
//! [`ApiQuery`] and [`ApiPath`] wrap axum's query and path extractors so a
//! malformed URL is reported with the same JSON error body as every other
//! failure.

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::{header::CONTENT_TYPE, request::Parts, StatusCode},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{CreateMedicineRequest, UpdateMedicineRequest};
use std::str::FromStr;

use crate::domain::{MedicineError, PrescriptionUpload};

/// Multipart field carrying the prescription image
pub const PRESCRIPTION_FIELD: &str = "prescription";

/// A parsed medicine write plus the optional uploaded image
#[derive(Debug)]
pub struct MedicineForm<T> {
    pub body: T,
    pub upload: Option<PrescriptionUpload>,
}

/// Request types that can also be built from multipart text fields
pub trait FormBody: Sized {
    fn from_fields(fields: FormFields) -> Result<Self, MedicineError>;
}

#[async_trait]
impl<S, T> FromRequest<S> for MedicineForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + FormBody + Send,
{
    type Rejection = MedicineError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            let (fields, upload) = read_multipart(multipart).await?;
            Ok(Self {
                body: T::from_fields(fields)?,
                upload,
            })
        } else if content_type.starts_with("application/json") {
            let Json(body) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| body_error(e.status(), e.body_text()))?;
            Ok(Self { body, upload: None })
        } else {
            Err(MedicineError::Validation(
                "Expected an application/json or multipart/form-data body".to_string(),
            ))
        }
    }
}

/// Oversized bodies get their own error; every other body rejection is a bad request
fn body_error(status: StatusCode, message: String) -> MedicineError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        MedicineError::PayloadTooLarge(format!("Request body is too large: {message}"))
    } else {
        MedicineError::Validation(message)
    }
}

/// Query string extractor whose rejection is a JSON validation error
#[derive(Debug)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = MedicineError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| MedicineError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

/// Path parameter extractor whose rejection is a JSON validation error
#[derive(Debug)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = MedicineError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| MedicineError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<(FormFields, Option<PrescriptionUpload>), MedicineError> {
    let invalid = |e: axum::extract::multipart::MultipartError| body_error(e.status(), e.body_text());

    let mut fields = FormFields::default();
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == PRESCRIPTION_FIELD {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.map_err(invalid)?;

            // Browsers submit an empty part when no file was chosen
            if file_name.is_empty() && bytes.is_empty() {
                continue;
            }
            if upload.is_some() {
                return Err(MedicineError::Validation(
                    "Only one prescription image can be uploaded".to_string(),
                ));
            }
            upload = Some(PrescriptionUpload {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(invalid)?;
            fields.values.push((name, value));
        }
    }

    Ok((fields, upload))
}

/// Text fields of a multipart form, in submission order
#[derive(Debug, Default)]
pub struct FormFields {
    values: Vec<(String, String)>,
}

impl FormFields {
    pub fn new(values: Vec<(String, String)>) -> Self {
        Self { values }
    }

    fn reject_unknown(&self, allowed: &[&str]) -> Result<(), MedicineError> {
        match self.values.iter().find(|(name, _)| !allowed.contains(&name.as_str())) {
            Some((name, _)) => Err(MedicineError::Validation(format!("Unknown field '{name}'"))),
            None => Ok(()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.values.iter().any(|(key, _)| key == name)
    }

    /// The value of a field that may appear at most once
    fn single(&self, name: &str) -> Result<Option<String>, MedicineError> {
        let mut matches = self.values.iter().filter(|(key, _)| key == name);
        let first = matches.next().map(|(_, value)| value.clone());
        if matches.next().is_some() {
            return Err(MedicineError::Validation(format!("Field '{name}' given more than once")));
        }
        Ok(first)
    }

    fn required(&self, name: &str) -> Result<String, MedicineError> {
        self.single(name)?
            .ok_or_else(|| MedicineError::Validation(format!("Missing field '{name}'")))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, MedicineError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.single(name)?
            .map(|raw| raw.parse::<T>().map_err(|e| MedicineError::Validation(e.to_string())))
            .transpose()
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, MedicineError> {
        self.single(name)?
            .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "yes" | "1" => Ok(true),
                "false" | "off" | "no" | "0" | "" => Ok(false),
                other => Err(MedicineError::Validation(format!("Field '{name}' must be true or false, got '{other}'"))),
            })
            .transpose()
    }

    /// Every `time_of_day` value; each may be a single time or a comma separated list
    fn times(&self) -> Result<Vec<shared::TimeOfDay>, MedicineError> {
        self.values
            .iter()
            .filter(|(key, _)| key == "time_of_day")
            .flat_map(|(_, value)| value.split(','))
            .filter(|part| !part.trim().is_empty())
            .map(|part| part.parse().map_err(|e: shared::ParseEnumError| MedicineError::Validation(e.to_string())))
            .collect()
    }
}

impl FormBody for CreateMedicineRequest {
    fn from_fields(fields: FormFields) -> Result<Self, MedicineError> {
        fields.reject_unknown(&["name", "type", "dosage", "time_of_day", "notes", "active"])?;

        Ok(CreateMedicineRequest {
            name: fields.required("name")?,
            medicine_type: fields.required("type")?.parse().map_err(|e: shared::ParseEnumError| {
                MedicineError::Validation(e.to_string())
            })?,
            dosage: fields.required("dosage")?,
            time_of_day: fields.times()?,
            notes: fields.single("notes")?,
            active: fields.flag("active")?,
            prescription_path: None,
        })
    }
}

impl FormBody for UpdateMedicineRequest {
    fn from_fields(fields: FormFields) -> Result<Self, MedicineError> {
        fields.reject_unknown(&[
            "name",
            "type",
            "dosage",
            "time_of_day",
            "notes",
            "active",
            "remove_prescription",
        ])?;

        Ok(UpdateMedicineRequest {
            name: fields.single("name")?,
            medicine_type: fields.parsed("type")?,
            dosage: fields.single("dosage")?,
            time_of_day: if fields.contains("time_of_day") {
                Some(fields.times()?)
            } else {
                None
            },
            notes: fields.single("notes")?,
            active: fields.flag("active")?,
            prescription_path: None,
            remove_prescription: fields.flag("remove_prescription")?.unwrap_or(false),
        })
    }
}

/// Body of the image-only upload endpoint
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrescriptionOnly {}

impl FormBody for PrescriptionOnly {
    fn from_fields(fields: FormFields) -> Result<Self, MedicineError> {
        fields.reject_unknown(&[])?;
        Ok(PrescriptionOnly {})
    }
}
