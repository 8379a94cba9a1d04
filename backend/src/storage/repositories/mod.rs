//! SQLite-backed repositories

pub mod medicine_repository;

pub use medicine_repository::MedicineRepository;
