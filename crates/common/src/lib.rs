//! Shared building blocks for the PetPal services: logging bootstrap,
//! runtime environment helpers and response types used by more than one crate.

pub mod types;
pub mod utils;
pub mod env;
