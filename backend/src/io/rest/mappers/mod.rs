pub mod medicine_mapper;
