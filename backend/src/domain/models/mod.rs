pub mod medicine;
