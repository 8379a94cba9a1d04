//! IO layer: the REST API and the server-rendered pages built on top of it.

pub mod rest;
pub mod views;
