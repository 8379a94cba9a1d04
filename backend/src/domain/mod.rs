//! # Domain Module
//!
//! Business rules for the medicine tracker.
//!
//! ## Module Organization
//!
//! - **models**: the `Medicine` entity, patches and validation errors
//! - **commands**: inputs accepted by the service, decoupled from wire DTOs
//! - **medicine_service**: validate-then-persist orchestration of the
//!   database and the prescription file store
//! - **error**: the error taxonomy surfaced to the IO layer
//!
//! ## Business Rules
//!
//! - Name, dosage and at least one time of day are required
//! - A linked prescription must exist in the file store when written
//! - A replaced or unlinked prescription is deleted only after the database
//!   write succeeded, and only when no other medicine links it
//! - Lists are ordered by earliest time of day, then name

pub mod commands;
pub mod error;
pub mod medicine_service;
pub mod models;

pub use commands::*;
pub use error::MedicineError;
pub use medicine_service::MedicineService;
