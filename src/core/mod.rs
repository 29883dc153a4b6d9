//! Business logic for fieldwork: services and the template registry.
//! Depends on the domain and storage contracts; no terminal I/O.

pub mod services;
pub mod templates;
