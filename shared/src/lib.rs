use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A medicine as exchanged with the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub medicine_type: MedicineType,
    /// Free-form dosage description, e.g. "500mg" or "10ml"
    pub dosage: String,
    /// Times of day in canonical order (morning, afternoon, evening)
    pub time_of_day: Vec<TimeOfDay>,
    pub notes: Option<String>,
    pub active: bool,
    /// Stored image identifier, served under `/prescriptions/<path>`
    pub prescription_path: Option<String>,
    /// RFC 3339
    pub created_at: String,
    /// RFC 3339
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MedicineType {
    Tablet,
    Syrup,
}

impl MedicineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MedicineType::Tablet => "tablet",
            MedicineType::Syrup => "syrup",
        }
    }
}

impl fmt::Display for MedicineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MedicineType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tablet" => Ok(MedicineType::Tablet),
            "syrup" => Ok(MedicineType::Syrup),
            _ => Err(ParseEnumError {
                kind: "medicine type",
                value: s.to_string(),
            }),
        }
    }
}

/// Schedule tag used for grouping and filtering.
///
/// Variants are declared in the order they occur during the day, so the
/// derived `Ord` gives display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Evening];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Evening => "evening",
        }
    }

    /// Heading used by the list view
    pub fn label(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "Morning",
            TimeOfDay::Afternoon => "Afternoon",
            TimeOfDay::Evening => "Evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "morning" => Ok(TimeOfDay::Morning),
            "afternoon" => Ok(TimeOfDay::Afternoon),
            "evening" => Ok(TimeOfDay::Evening),
            _ => Err(ParseEnumError {
                kind: "time of day",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown {}: '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseEnumError {}

/// Body of `POST /medicines`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMedicineRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub medicine_type: MedicineType,
    pub dosage: String,
    pub time_of_day: Vec<TimeOfDay>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to true when omitted
    #[serde(default)]
    pub active: Option<bool>,
    /// Link to an image that is already in the prescription store
    #[serde(default)]
    pub prescription_path: Option<String>,
}

/// Body of `PUT`/`PATCH /medicines/:id`; omitted fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateMedicineRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub medicine_type: Option<MedicineType>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<Vec<TimeOfDay>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub prescription_path: Option<String>,
    /// Unlink and delete the current prescription image
    #[serde(default)]
    pub remove_prescription: bool,
}

/// Query string of `GET /medicines`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MedicineListQuery {
    /// An empty value (`?time_of_day=`) means no filter
    #[serde(default, deserialize_with = "empty_as_none")]
    pub time_of_day: Option<TimeOfDay>,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<TimeOfDay>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineListResponse {
    pub medicines: Vec<Medicine>,
}

/// Response of `POST /medicines/:id/prescription`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionUploadResponse {
    pub medicine: Medicine,
    /// URL the image is served from
    pub url: String,
}

/// Error body returned for every non-2xx response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}
